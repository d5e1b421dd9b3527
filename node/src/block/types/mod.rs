pub(crate) mod block;
pub(crate) mod id;
pub(crate) mod transaction;
