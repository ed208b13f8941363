//! Readers for the two portal pages.
//!
//! `fields` scrapes the label/value list of the personal data page; `records`
//! reads the real estate listing straight out of the page's AngularJS scope.

pub mod fields;
pub mod records;

pub use fields::RawFieldMap;
pub use records::RawRecord;
