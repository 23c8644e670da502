//! Order book types: per-venue top-of-book (§4.1), the richer L2 variant,
//! and the cross-venue consolidated book with NBBO (§4.2).

pub mod consolidated;
pub mod l2;
pub mod venue;

pub use consolidated::{ConsolidatedBook, Nbbo};
pub use l2::L2Book;
pub use venue::VenueBook;
