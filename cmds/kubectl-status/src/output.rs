//! Terminal output helpers.

use std::io::{self, ErrorKind, IsTerminal, Write};

use clap::ValueEnum;

/// When reports are coloured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
	/// Colour when stdout is a terminal and `NO_COLOR` is unset.
	#[default]
	Auto,
	Always,
	Never,
}

impl ColorMode {
	pub fn should_colorize(self) -> bool {
		match self {
			Self::Always => true,
			Self::Never => false,
			Self::Auto => std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal(),
		}
	}
}

/// A writer wrapper that silently handles broken pipe errors.
///
/// A broken pipe (EPIPE) is turned into a successful write, so
/// `kubectl status pods | head -1` exits cleanly.
pub struct BrokenPipeGuard<W> {
	inner: W,
}

impl<W> BrokenPipeGuard<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}
}

impl<W: Write> Write for BrokenPipeGuard<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self.inner.write(buf) {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(buf.len()),
			other => other,
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self.inner.flush() {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
			other => other,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct ClosedPipe;

	impl Write for ClosedPipe {
		fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
			Err(ErrorKind::BrokenPipe.into())
		}

		fn flush(&mut self) -> io::Result<()> {
			Err(ErrorKind::BrokenPipe.into())
		}
	}

	struct Failing;

	impl Write for Failing {
		fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
			Err(ErrorKind::PermissionDenied.into())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn test_color_mode_fixed() {
		assert!(ColorMode::Always.should_colorize());
		assert!(!ColorMode::Never.should_colorize());
	}

	#[test]
	fn test_broken_pipe_is_swallowed() {
		let mut out = BrokenPipeGuard::new(ClosedPipe);
		writeln!(out, "report").unwrap();
		out.flush().unwrap();
	}

	#[test]
	fn test_other_errors_pass_through() {
		let mut out = BrokenPipeGuard::new(Failing);
		let err = out.write(b"report").unwrap_err();
		assert_eq!(err.kind(), ErrorKind::PermissionDenied);
	}
}
