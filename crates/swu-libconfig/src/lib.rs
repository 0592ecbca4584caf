//! Ordered libconfig trees for `sw-description` files.
//!
//! Loads a libconfig document into a [`Document`] whose groups keep their
//! settings in source order, and writes it back in a stable layout. The
//! tree is plain data: callers walk and mutate it directly.

mod parser;
mod value;
mod writer;

pub use parser::{parse, parse_file, ParseError};
pub use value::{Document, Group, Setting, Value};
pub use writer::{to_string, write_file};
