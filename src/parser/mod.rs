//! Document parsing: PDF pages into layout primitives, slide decks into text.

mod backend;
mod content;
mod layout;
mod pptx;

pub use backend::{decode_text_simple, ContentOp, PagedDocument, PdfDocument, PdfValue};
pub use content::{ContentInterpreter, FontResolver, Matrix, PageMarks, XObjectKind};
pub use layout::{Column, FontStatistics, LayoutAnalyzer, TextLine, TextSpan};
pub use pptx::{read_slides, SlideText};
