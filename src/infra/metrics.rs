// ============================================================
// Layer 6 — Loss Tracking
// ============================================================
// Two running accumulators over the per-caption training loss:
//
//   print accumulator — averaged and reset every `print_every`
//                       iterations for the progress line
//   plot accumulator  — averaged and reset every `plot_every`
//                       iterations; each average is one point of
//                       the loss curve
//
// Averages are over the losses actually recorded in the window:
// an iteration skipped for an unreadable image adds nothing but
// still counts toward the window boundary.
//
// Loss-curve points are appended to loss_curve.csv as they are
// produced, so a long run can be plotted while it is training:
//
//   iteration,avg_loss
//   200,5.812345
//   400,5.103210
//   ...

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

/// One point of the loss curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossPoint {
    pub iteration: usize,
    pub avg_loss:  f64,
}

/// What a call to `LossTracker::record` or `skip` completed.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LossReport {
    /// Average since the last progress line, when one is due
    pub print: Option<f64>,
    /// New loss-curve point, when one is due
    pub plot:  Option<LossPoint>,
}

/// Sum and count of the losses seen since a window was last closed.
#[derive(Debug, Default, Clone, Copy)]
struct Window {
    total: f64,
    count: usize,
}

impl Window {
    fn add(&mut self, loss: f64) {
        self.total += loss;
        self.count += 1;
    }

    /// Average of the window, resetting it. None when nothing was added.
    fn close(&mut self) -> Option<f64> {
        let avg = (self.count > 0).then(|| self.total / self.count as f64);
        *self = Self::default();
        avg
    }
}

#[derive(Debug, Clone)]
pub struct LossTracker {
    print_every: usize,
    plot_every:  usize,
    print:       Window,
    plot:        Window,
    points:      Vec<LossPoint>,
}

impl LossTracker {
    /// A zero interval disables that accumulator.
    pub fn new(print_every: usize, plot_every: usize) -> Self {
        Self {
            print_every,
            plot_every,
            print:  Window::default(),
            plot:   Window::default(),
            points: Vec::new(),
        }
    }

    /// Add the loss of training iteration `iteration` (1-based).
    pub fn record(&mut self, iteration: usize, loss: f64) -> LossReport {
        self.advance(iteration, Some(loss))
    }

    /// Iteration `iteration` produced no loss. Windows ending here
    /// still close, averaged over the losses they did receive.
    pub fn skip(&mut self, iteration: usize) -> LossReport {
        self.advance(iteration, None)
    }

    fn advance(&mut self, iteration: usize, loss: Option<f64>) -> LossReport {
        if let Some(loss) = loss {
            self.print.add(loss);
            self.plot.add(loss);
        }

        let mut report = LossReport::default();

        if self.print_every > 0 && iteration % self.print_every == 0 {
            report.print = self.print.close();
        }

        if self.plot_every > 0 && iteration % self.plot_every == 0 {
            if let Some(avg_loss) = self.plot.close() {
                let point = LossPoint { iteration, avg_loss };
                self.points.push(point);
                report.plot = Some(point);
            }
        }

        report
    }

    pub fn points(&self) -> &[LossPoint] {
        &self.points
    }
}

/// Writes loss-curve points to `<dir>/loss_curve.csv`.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Start a fresh curve, replacing one left by an earlier run.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("loss_curve.csv");
        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "iteration,avg_loss")?;

        Ok(Self { csv_path })
    }

    pub fn log(&self, point: &LossPoint) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{},{:.6}", point.iteration, point.avg_loss)?;

        tracing::debug!("Loss curve: iteration {} avg {:.4}", point.iteration, point.avg_loss);
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
