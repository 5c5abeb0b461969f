//! Turning block data into files and frames.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use polars::prelude::*;

use crate::record::BlockData;

const SAMPLE_COLUMN_NAME: &str = "Sample";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("DataFrame error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Channel {channel} has {found} samples, expected {expected}")]
    RaggedChannels {
        channel: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    /// Convention of the host the crate is compiled for.
    pub fn native() -> Self {
        if cfg!(windows) {
            Self::CrLf
        } else {
            Self::Lf
        }
    }

    fn terminator(self) -> ::csv::Terminator {
        match self {
            Self::Lf => ::csv::Terminator::Any(b'\n'),
            Self::CrLf => ::csv::Terminator::CRLF,
        }
    }
}

impl Default for LineEnding {
    fn default() -> Self {
        Self::native()
    }
}

fn channel_name(ch: usize) -> String {
    format!("Ch{}", ch)
}

/// Samples per channel, provided all channels have the same length.
fn rectangular_len(data: &BlockData) -> Result<usize, ExportError> {
    let expected = data.channel(0).map_or(0, <[f32]>::len);
    for (channel, samples) in data.channels().iter().enumerate() {
        if samples.len() != expected {
            return Err(ExportError::RaggedChannels {
                channel,
                expected,
                found: samples.len(),
            });
        }
    }
    Ok(expected)
}

/// Writes `Sample;Ch0;Ch1;...` followed by one row per sample.
///
/// Sample numbers count from the block's start index. Values use the
/// shortest decimal form that reads back to the same `f32`.
pub fn write_csv<W: Write>(writer: W, data: &BlockData, line_ending: LineEnding) -> Result<(), ExportError> {
    let samples = rectangular_len(data)?;
    let mut csv = ::csv::WriterBuilder::new()
        .delimiter(b';')
        .terminator(line_ending.terminator())
        .from_writer(writer);

    let mut header = vec![SAMPLE_COLUMN_NAME.to_string()];
    header.extend((0..data.channel_count()).map(channel_name));
    csv.write_record(&header)?;

    let mut row = Vec::with_capacity(header.len());
    for i in 0..samples {
        row.clear();
        row.push((data.start_index() + i as u64).to_string());
        row.extend(data.channels().iter().map(|channel| channel[i].to_string()));
        csv.write_record(&row)?;
    }

    csv.flush()?;
    Ok(())
}

pub fn write_csv_file(path: &Path, data: &BlockData, line_ending: LineEnding) -> Result<(), ExportError> {
    let file = File::create(path)?;
    write_csv(file, data, line_ending)?;
    log::info!(
        "Wrote {} samples of {} channels to '{}'",
        data.sample_count(),
        data.channel_count(),
        path.display()
    );
    Ok(())
}

/// Per channel statistics of a block.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSummary {
    pub channel: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl BlockData {
    /// `Sample` column followed by one `Ch<n>` column per channel.
    pub fn to_dataframe(&self) -> Result<DataFrame, ExportError> {
        let samples = rectangular_len(self)?;

        let mut columns: Vec<Column> = Vec::with_capacity(self.channel_count() + 1);
        let index: Vec<u64> = (0..samples as u64).map(|i| self.start_index() + i).collect();
        columns.push(Series::new(SAMPLE_COLUMN_NAME.into(), index).into());
        for (ch, values) in self.channels().iter().enumerate() {
            columns.push(Series::new(channel_name(ch).into(), values.as_slice()).into());
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Min, max and mean of every channel.
    pub fn summarize(&self) -> Result<Vec<ChannelSummary>, ExportError> {
        let names: Vec<String> = (0..self.channel_count()).map(channel_name).collect();
        let exprs: Vec<Expr> = names
            .iter()
            .flat_map(|name| {
                let values = col(name.as_str()).cast(DataType::Float64);
                [
                    values.clone().min().alias(format!("{}_min", name)),
                    values.clone().max().alias(format!("{}_max", name)),
                    values.mean().alias(format!("{}_mean", name)),
                ]
            })
            .collect();

        if exprs.is_empty() {
            return Ok(Vec::new());
        }
        let stats = self.to_dataframe()?.lazy().select(exprs).collect()?;

        let stat = |name: &str, suffix: &str| -> Result<f64, ExportError> {
            let column = stats.column(&format!("{}_{}", name, suffix))?;
            Ok(column.f64()?.get(0).unwrap_or(f64::NAN))
        };

        names
            .iter()
            .enumerate()
            .map(|(channel, name)| {
                Ok(ChannelSummary {
                    channel,
                    min: stat(name, "min")?,
                    max: stat(name, "max")?,
                    mean: stat(name, "mean")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TiePie;
    use crate::device_list::DeviceKey;
    use crate::fake::{FakeClock, FakeDevice, FakeSdk};
    use crate::poll::Poller;
    use std::time::Duration;

    fn block() -> BlockData {
        BlockData::new(1e6, 0, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
    }

    #[test]
    fn test_csv_layout() {
        let mut out = Vec::new();
        write_csv(&mut out, &block(), LineEnding::Lf).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Sample;Ch0;Ch1\n0;1;4\n1;2;5\n2;3;6\n");

        let mut out = Vec::new();
        write_csv(&mut out, &block(), LineEnding::CrLf).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Sample;Ch0;Ch1\r\n0;1;4\r\n1;2;5\r\n2;3;6\r\n"
        );
    }

    #[test]
    fn test_csv_values_and_offset() {
        let data = BlockData::new(1e6, 10, vec![vec![0.5, -0.25]]);
        let mut out = Vec::new();
        write_csv(&mut out, &data, LineEnding::Lf).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Sample;Ch0\n10;0.5\n11;-0.25\n");
    }

    #[test]
    fn test_ragged_channels_are_rejected() {
        let data = BlockData::new(1e6, 0, vec![vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(
            write_csv(Vec::new(), &data, LineEnding::Lf),
            Err(ExportError::RaggedChannels { channel: 1, expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_acquisition_to_csv_file() {
        let tiepie = TiePie::new(
            FakeSdk::new().with_device(
                FakeDevice::oscilloscope("Handyscope HS5", 1)
                    .channels(2)
                    .data(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
                    .ready_after(2),
            ),
        );
        tiepie.update_list().unwrap();

        let mut scope = tiepie.find_block_oscilloscope().unwrap();
        scope.set_record_length(3).unwrap();
        let poller = Poller::with_clock(FakeClock::new(), Duration::from_millis(10));
        let (_scope, data) = scope.start().map_err(|(_, e)| e).unwrap().wait(&poller).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("OscilloscopeBlock.csv");
        write_csv_file(&path, &data, LineEnding::Lf).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "Sample;Ch0;Ch1\n0;1;4\n1;2;5\n2;3;6\n");
    }

    #[test]
    fn test_dataframe_view() {
        let df = block().to_dataframe().unwrap();
        assert_eq!(df.shape(), (3, 3));
        assert_eq!(
            df.get_column_names_str(),
            vec![SAMPLE_COLUMN_NAME, "Ch0", "Ch1"]
        );
        let ch1: Vec<f32> = df.column("Ch1").unwrap().f32().unwrap().into_no_null_iter().collect();
        assert_eq!(ch1, vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_summary() {
        let summary = block().summarize().unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].channel, 0);
        assert!((summary[0].min - 1.0).abs() < 1e-9);
        assert!((summary[0].max - 3.0).abs() < 1e-9);
        assert!((summary[1].mean - 5.0).abs() < 1e-9);
    }
}
