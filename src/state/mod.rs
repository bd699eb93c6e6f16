pub mod collapse;
pub mod doc_index;
pub mod document_state;
pub mod effects;
pub mod highlights;
pub mod history;
pub mod history_collapse;
pub mod revision;
