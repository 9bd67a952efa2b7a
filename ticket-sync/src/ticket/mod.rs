//! Ticket parsing.
//!
//! The first page's text decides the route: tickets carrying the structured
//! layout's marker are parsed by pattern and timed from the train schedule;
//! everything else goes to the generative model. Either way the result is a
//! validated [`TravelRecord`](crate::domain::TravelRecord) or a
//! [`TicketParseError`] naming the file.

mod error;
mod generic;
mod parser;
mod structured;
mod text;

pub use error::{TicketError, TicketParseError};
pub use generic::{EXTRACTION_PROMPT, GenericExtractor, ModelPoint, ModelTicket};
pub use parser::{TicketLayout, TicketParser};
pub use structured::{STRUCTURED_MARKER, StructuredExtractor, StructuredFields};
pub use text::{PdfText, TextExtractor};

#[cfg(test)]
pub(crate) use generic::fake;
#[cfg(test)]
pub(crate) use structured::fixtures;
