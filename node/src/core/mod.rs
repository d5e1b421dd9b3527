pub(crate) mod api_cmd;
pub mod builder;
pub mod pichain;
pub mod shutdown;
