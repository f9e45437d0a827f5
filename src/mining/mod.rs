pub mod forward_similarity;
