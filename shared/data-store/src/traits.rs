use anyhow::Result;

/// A key-addressed append log holding raw batch tokens.
pub trait BatchSource: Send {
    /// Returns every token stored under `id`, in insertion order.
    /// An id with no stored data yields an empty list.
    fn read_tokens(
        &mut self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}
