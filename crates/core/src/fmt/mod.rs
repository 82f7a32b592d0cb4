//! Display helpers for rendering clause sequences and identifier lists.

use std::cell::Cell;
use std::fmt::{self, Display, Formatter, Write};

/// Implements `fmt::Display` by calling some closure on some value.
pub(crate) struct Fmt<T, F> {
	contents: Cell<Option<T>>,
	formatter: F,
}

impl<T, F: Fn(T, &mut Formatter) -> fmt::Result> Fmt<T, F> {
	pub(crate) fn new(t: T, formatter: F) -> Self {
		Self {
			contents: Cell::new(Some(t)),
			formatter,
		}
	}
}

impl<T, F: Fn(T, &mut Formatter) -> fmt::Result> Display for Fmt<T, F> {
	/// fmt is single-use only.
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		let contents = self.contents.replace(None).expect("only call Fmt::fmt once");
		(self.formatter)(contents, f)
	}
}

impl<I: IntoIterator<Item = T>, T: Display> Fmt<I, fn(I, &mut Formatter) -> fmt::Result> {
	/// Formats values with a comma and a space separating them.
	pub(crate) fn comma_separated(into_iter: I) -> Self {
		Self::new(into_iter, fmt_comma_separated)
	}

	/// Formats values with a new line separating them.
	pub(crate) fn one_line_separated(into_iter: I) -> Self {
		Self::new(into_iter, fmt_one_line_separated)
	}
}

fn fmt_comma_separated<T: Display>(
	into_iter: impl IntoIterator<Item = T>,
	f: &mut Formatter,
) -> fmt::Result {
	for (i, v) in into_iter.into_iter().enumerate() {
		if i > 0 {
			f.write_str(", ")?;
		}
		Display::fmt(&v, f)?;
	}
	Ok(())
}

fn fmt_one_line_separated<T: Display>(
	into_iter: impl IntoIterator<Item = T>,
	f: &mut Formatter,
) -> fmt::Result {
	for (i, v) in into_iter.into_iter().enumerate() {
		if i > 0 {
			f.write_char('\n')?;
		}
		Display::fmt(&v, f)?;
	}
	Ok(())
}

/// Escapes an identifier for use in emitted query text, wrapping it in
/// backticks unless it is a plain alphanumeric name.
pub(crate) struct EscapeIdent<'a>(pub &'a str);

impl Display for EscapeIdent<'_> {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		let plain = !self.0.is_empty()
			&& !self.0.starts_with(|c: char| c.is_ascii_digit())
			&& self.0.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
		if plain {
			f.write_str(self.0)
		} else {
			f.write_char('`')?;
			for c in self.0.chars() {
				if c == '`' {
					f.write_str("``")?;
				} else {
					f.write_char(c)?;
				}
			}
			f.write_char('`')
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn comma_separated() {
		let out = format!("{}", Fmt::comma_separated(["a", "b", "c"]));
		assert_eq!(out, "a, b, c");
	}

	#[test]
	fn escape_ident() {
		assert_eq!(format!("{}", EscapeIdent("title")), "title");
		assert_eq!(format!("{}", EscapeIdent("release year")), "`release year`");
		assert_eq!(format!("{}", EscapeIdent("1st")), "`1st`");
	}
}
