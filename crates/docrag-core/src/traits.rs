use crate::error::{Error, Result};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| Error::Embedding("embedder returned no vector".into()))
    }
}

/// Where documents come from. Implementations report failures as `Error::Fetch`.
pub trait DocumentSource: Send + Sync {
    fn get_page_as_text(&self, page_reference: &str) -> Result<String>;
}

impl<S: DocumentSource + ?Sized> DocumentSource for Box<S> {
    fn get_page_as_text(&self, page_reference: &str) -> Result<String> {
        (**self).get_page_as_text(page_reference)
    }
}
