pub mod markup;
pub mod markup_normalizer;
pub mod sentences;
