pub mod material_request;

pub use material_request::{
    MaterialItemRow, MaterialRequest, RequestStatus, RequestType, ShipmentConfirmation,
    SourceOption, TransportMode, UrgencyOption,
};
