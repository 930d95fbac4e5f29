//! Result output formatting and writing.

use crate::orchestrator::{RunResults, SignalSummary};
use crate::OutputFormat;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

fn or_dash(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.6}", v))
}

fn or_empty(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

fn signals(
    results: &RunResults,
) -> impl Iterator<Item = (&str, usize, &'static str, &SignalSummary)> + '_ {
    results.points.iter().flat_map(|point| {
        point.windings.iter().flat_map(move |winding| {
            [
                ("current", winding.current.as_ref()),
                ("voltage", winding.voltage.as_ref()),
                ("magnetizing_current", winding.magnetizing_current.as_ref()),
            ]
            .into_iter()
            .filter_map(move |(kind, summary)| summary.map(|s| (point.name.as_str(), winding.index, kind, s)))
        })
    })
}

/// Write run results to the output directory.
pub fn write_results(
    results: &RunResults,
    output_dir: &Path,
    format: OutputFormat,
    write_operating_points: bool,
) -> Result<()> {
    let file_name = match format {
        OutputFormat::Text => "summary.txt",
        OutputFormat::Json => "summary.json",
        OutputFormat::Csv => "summary.csv",
    };
    let summary_path = output_dir.join(file_name);
    let mut f = std::fs::File::create(&summary_path)
        .with_context(|| format!("Failed to create {:?}", summary_path))?;

    match format {
        OutputFormat::Text => write_text(&mut f, results)?,
        OutputFormat::Json => writeln!(f, "{}", serde_json::to_string_pretty(results)?)?,
        OutputFormat::Csv => {
            writeln!(f, "operating_point,winding,signal,label,peak_to_peak,offset,duty_cycle,rms,thd,effective_frequency,harmonics")?;
            for (point, winding, kind, s) in signals(results) {
                writeln!(
                    f,
                    "{},{},{},{},{},{},{},{},{},{},{}",
                    point,
                    winding,
                    kind,
                    s.label,
                    s.peak_to_peak,
                    s.offset,
                    or_empty(s.duty_cycle),
                    or_empty(s.rms),
                    or_empty(s.thd),
                    or_empty(s.effective_frequency),
                    s.harmonics
                )?;
            }
        }
    }
    tracing::info!("Wrote summary to {:?}", summary_path);

    if write_operating_points {
        let points_path = output_dir.join("operating_points.json");
        let points: Vec<_> = results.points.iter().map(|p| &p.operating_point).collect();
        let f = std::fs::File::create(&points_path)
            .with_context(|| format!("Failed to create {:?}", points_path))?;
        serde_json::to_writer_pretty(f, &points)?;

        tracing::info!("Wrote {} operating points to {:?}", points.len(), points_path);
    }

    Ok(())
}

fn write_text(f: &mut impl Write, results: &RunResults) -> Result<()> {
    writeln!(f, "Magnetic Kernel Run Summary: {}", results.name)?;
    writeln!(f, "============================")?;

    for point in &results.points {
        writeln!(f)?;
        writeln!(f, "{}", point.name)?;
        if let Some(k) = point.waveform_coefficient {
            writeln!(f, "  Waveform coefficient: {:.4}", k)?;
        }
        for winding in &point.windings {
            writeln!(
                f,
                "  Winding {} ({:.1} kHz, switching {:.1} kHz)",
                winding.index,
                winding.frequency / 1e3,
                winding.switching_frequency / 1e3
            )?;
            for (kind, summary) in [
                ("Current", &winding.current),
                ("Voltage", &winding.voltage),
                ("Magnetizing", &winding.magnetizing_current),
            ] {
                if let Some(s) = summary {
                    writeln!(
                        f,
                        "    {:<12} {:<22} pp={:.6} offset={:.6} rms={} thd={}",
                        kind,
                        s.label,
                        s.peak_to_peak,
                        s.offset,
                        or_dash(s.rms),
                        or_dash(s.thd)
                    )?;
                }
            }
        }
    }

    Ok(())
}

/// Print results to stdout.
pub fn print_results(results: &RunResults) -> Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    write_text(&mut lock, results)?;
    writeln!(lock)?;
    Ok(())
}

/// Print the statistics of a single signal to stdout.
pub fn print_signal(summary: &SignalSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
        OutputFormat::Csv => {
            println!("label,peak_to_peak,offset,duty_cycle,rms,thd,effective_frequency,harmonics");
            println!(
                "{},{},{},{},{},{},{},{}",
                summary.label,
                summary.peak_to_peak,
                summary.offset,
                or_empty(summary.duty_cycle),
                or_empty(summary.rms),
                or_empty(summary.thd),
                or_empty(summary.effective_frequency),
                summary.harmonics
            );
        }
        OutputFormat::Text => {
            println!("Label:               {}", summary.label);
            println!("Peak-to-peak:        {:.6}", summary.peak_to_peak);
            println!("Offset:              {:.6}", summary.offset);
            println!("Duty cycle:          {}", or_dash(summary.duty_cycle));
            println!("RMS:                 {}", or_dash(summary.rms));
            println!("THD:                 {}", or_dash(summary.thd));
            println!("Effective frequency: {}", or_dash(summary.effective_frequency));
            println!("Harmonics:           {}", summary.harmonics);
        }
    }
    Ok(())
}
