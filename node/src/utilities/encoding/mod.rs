use serde::Serialize;

//JSON is fine for now, every value we store or send is small
pub(crate) fn encode<M: Serialize>(message: &M) -> anyhow::Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(|e| anyhow::anyhow!(e))
}

pub(crate) fn decode<M: for<'de> serde::Deserialize<'de>>(bytes: &[u8]) -> anyhow::Result<M> {
    serde_json::from_slice(bytes).map_err(|e| anyhow::anyhow!(e))
}
