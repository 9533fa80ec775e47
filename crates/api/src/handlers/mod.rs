pub mod bot_request;
pub mod status;
