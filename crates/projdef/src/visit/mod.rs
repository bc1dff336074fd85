//! visitor pattern helpers
mod visit_strings;
pub use visit_strings::VisitStrings;

use crate::value::PathSegment;

/// Visitor that is handed each subject together with its location
pub trait Visit<T: ?Sized> {
    fn visit(&mut self, path: &[PathSegment], value: &T);
}

// blanket impl for FnMut
impl<T, F> Visit<T> for F
where
    T: ?Sized,
    F: FnMut(&[PathSegment], &T),
{
    fn visit(&mut self, path: &[PathSegment], value: &T) {
        self(path, value)
    }
}
