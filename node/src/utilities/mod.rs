pub(crate) mod encoding;
pub(crate) mod time;
