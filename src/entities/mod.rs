pub mod material_request;
