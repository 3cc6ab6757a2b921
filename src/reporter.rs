//! Energy reporter: writes the potential energy of selected force groups at a
//! fixed step interval as delimited text.
//!
//! Output looks like
//!
//! ```text
//! # "Energy0" "Energy1"
//! -12.5 3.25
//! -11.75 3.5
//! ```
//!
//! Values use the shortest round-trip digits; exponents carry a sign and at
//! least two digits (`1e-05`, `2.5e+20`).
//!
//! Files ending in `.gz` or `.bz2` are compressed when the corresponding
//! cargo feature (`gzip`, `bzip2`) is enabled.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use nalgebra::Vector3;

use crate::error::{AmdError, Result};
use crate::provider::{ForceGroup, ForceGroupProvider};

/// Shortest round-trip text of `e`, switching to scientific notation below
/// `1e-4` and from `1e16` on.
fn format_energy(e: f64) -> String {
    if e.is_nan() {
        return "nan".to_string();
    }
    if e.is_infinite() {
        return if e > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if e == 0.0 || (1e-4..1e16).contains(&e.abs()) {
        return format!("{:?}", e);
    }
    let sci = format!("{:e}", e);
    match sci.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => sci,
    }
}

/// A sink the reporter opened itself and must finalize on teardown.
trait OwnedSink: Write {
    fn finish(self: Box<Self>) -> io::Result<()>;
}

impl OwnedSink for BufWriter<File> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.flush()
    }
}

#[cfg(feature = "gzip")]
impl OwnedSink for flate2::write::GzEncoder<File> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        (*self).finish().map(|_| ())
    }
}

#[cfg(feature = "bzip2")]
impl OwnedSink for bzip2::write::BzEncoder<File> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        (*self).finish().map(|_| ())
    }
}

enum Sink<'a> {
    /// Opened from a path; finished (trailer written, file closed) on drop.
    Owned(Box<dyn OwnedSink>),
    /// Handed in by the caller; only ever flushed.
    Provided(Box<dyn Write + 'a>),
}

impl Write for Sink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Owned(w) => w.write(buf),
            Sink::Provided(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Owned(w) => w.flush(),
            Sink::Provided(w) => w.flush(),
        }
    }
}

fn open_sink(path: &Path) -> Result<Box<dyn OwnedSink>> {
    let name = path.to_string_lossy();
    if name.ends_with(".gz") {
        open_gzip(path)
    } else if name.ends_with(".bz2") {
        open_bzip2(path)
    } else {
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }
}

#[cfg(feature = "gzip")]
fn open_gzip(path: &Path) -> Result<Box<dyn OwnedSink>> {
    let file = File::create(path)?;
    Ok(Box::new(flate2::write::GzEncoder::new(
        file,
        flate2::Compression::default(),
    )))
}

#[cfg(not(feature = "gzip"))]
fn open_gzip(_path: &Path) -> Result<Box<dyn OwnedSink>> {
    Err(AmdError::CompressionUnavailable { suffix: ".gz" })
}

#[cfg(feature = "bzip2")]
fn open_bzip2(path: &Path) -> Result<Box<dyn OwnedSink>> {
    let file = File::create(path)?;
    Ok(Box::new(bzip2::write::BzEncoder::new(
        file,
        bzip2::Compression::default(),
    )))
}

#[cfg(not(feature = "bzip2"))]
fn open_bzip2(_path: &Path) -> Result<Box<dyn OwnedSink>> {
    Err(AmdError::CompressionUnavailable { suffix: ".bz2" })
}

pub struct EnergyReporter<'a> {
    interval: u64,
    groups: Vec<ForceGroup>,
    separator: String,
    sink: Option<Sink<'a>>,
    has_header: bool,
}

impl EnergyReporter<'static> {
    /// Report to a file, compressed according to its suffix.
    ///
    /// Fails before creating the file when the suffix asks for a compression
    /// format that was not compiled in.
    pub fn create<P: AsRef<Path>>(path: P, interval: u64, groups: Vec<ForceGroup>) -> Result<Self> {
        check_interval(interval)?;
        let sink = open_sink(path.as_ref())?;
        Ok(Self::with_sink(Sink::Owned(sink), interval, groups))
    }
}

impl<'a> EnergyReporter<'a> {
    /// Report to a writer owned by the caller. The writer is flushed after
    /// every line but never finalized.
    pub fn to_writer<W: Write + 'a>(writer: W, interval: u64, groups: Vec<ForceGroup>) -> Result<Self> {
        check_interval(interval)?;
        Ok(Self::with_sink(
            Sink::Provided(Box::new(writer)),
            interval,
            groups,
        ))
    }

    fn with_sink(sink: Sink<'a>, interval: u64, groups: Vec<ForceGroup>) -> Self {
        Self {
            interval,
            groups,
            separator: " ".to_string(),
            sink: Some(sink),
            has_header: false,
        }
    }

    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn groups(&self) -> &[ForceGroup] {
        &self.groups
    }

    /// Steps remaining until the next report, counted from `current_step`.
    pub fn steps_until_next_report(&self, current_step: u64) -> u64 {
        self.interval - current_step % self.interval
    }

    pub fn is_due(&self, step: u64) -> bool {
        step % self.interval == 0
    }

    /// Evaluate every group's energy at `positions` and write one row.
    pub fn report(
        &mut self,
        provider: &dyn ForceGroupProvider,
        positions: &[Vector3<f64>],
    ) -> Result<Vec<f64>> {
        let energies: Vec<f64> = self
            .groups
            .iter()
            .map(|&g| provider.energy(g, positions))
            .collect();
        self.write_row(&energies)?;
        Ok(energies)
    }

    /// Write one row of already computed energies, preceded by the header
    /// on first use.
    pub fn write_row(&mut self, energies: &[f64]) -> Result<()> {
        crate::error::require_len("reported energies", self.groups.len(), energies.len())?;

        if !self.has_header {
            let header = self.header();
            self.write_line(&header)?;
            self.has_header = true;
        }

        let row = energies
            .iter()
            .map(|&e| format_energy(e))
            .collect::<Vec<_>>()
            .join(&self.separator);
        self.write_line(&row)
    }

    fn header(&self) -> String {
        let names = self
            .groups
            .iter()
            .map(|g| format!("Energy{}", g))
            .collect::<Vec<_>>()
            .join(&format!("\"{}\"", self.separator));
        format!("# \"{}\"", names)
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| AmdError::Io(io::Error::new(io::ErrorKind::Other, "reporter closed")))?;
        writeln!(sink, "{}", line)?;
        sink.flush()?;
        Ok(())
    }

    /// Flush and, for sinks opened by the reporter, finalize and close the file.
    pub fn close(mut self) -> Result<()> {
        self.finish_sink()
    }

    fn finish_sink(&mut self) -> Result<()> {
        match self.sink.take() {
            Some(Sink::Owned(w)) => w.finish()?,
            Some(Sink::Provided(mut w)) => w.flush()?,
            None => {}
        }
        Ok(())
    }
}

impl Drop for EnergyReporter<'_> {
    fn drop(&mut self) {
        let _ = self.finish_sink();
    }
}

fn check_interval(interval: u64) -> Result<()> {
    if interval == 0 {
        return Err(AmdError::InvalidParameter {
            name: "report interval",
            value: 0.0,
            reason: "must be at least one step",
        });
    }
    Ok(())
}
