//! Plotting backends. The results table is handed to an external program (gnuplot by default)
//! together with a plot script; tests and batch runs use the silent backend.
use enum_dispatch::enum_dispatch;
use log::info;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("{program} exited with {status}")]
    ProgramFailed { program: String, status: String },
}

#[enum_dispatch]
pub trait Renderer {
    /// draws the results table stored in `data_file`
    fn render(&self, data_file: &Path) -> Result<(), PlotError>;
}

/// Runs `<program> <script>` and waits for it
#[derive(Debug, Clone)]
pub struct GnuplotRenderer {
    pub program: String,
    pub script: PathBuf,
    /// picture produced by the default script
    pub image: PathBuf,
}

impl GnuplotRenderer {
    pub fn new(program: &str, script: &Path, image: &Path) -> Self {
        Self {
            program: program.to_string(),
            script: script.to_path_buf(),
            image: image.to_path_buf(),
        }
    }
}

impl Renderer for GnuplotRenderer {
    fn render(&self, data_file: &Path) -> Result<(), PlotError> {
        if !self.script.exists() {
            write_default_script(&self.script, data_file, &self.image)?;
            info!("default plot script written to {}", self.script.display());
        }
        info!("running {} {}", self.program, self.script.display());
        let status = Command::new(&self.program).arg(&self.script).status()?;
        if !status.success() {
            return Err(PlotError::ProgramFailed {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }
        info!("plot saved to {}", self.image.display());
        Ok(())
    }
}

/// Does nothing
#[derive(Debug, Clone, Default)]
pub struct SilentRenderer;

impl Renderer for SilentRenderer {
    fn render(&self, data_file: &Path) -> Result<(), PlotError> {
        info!("plotting disabled, results are in {}", data_file.display());
        Ok(())
    }
}

#[enum_dispatch(Renderer)]
#[derive(Debug, Clone)]
pub enum PlotBackend {
    Gnuplot(GnuplotRenderer),
    Silent(SilentRenderer),
}

/// Plot script drawing x, v and a against t in three panels of one PNG
pub fn default_gnuplot_script(data_file: &Path, image: &Path) -> String {
    let data = data_file.display().to_string().replace('\'', "");
    let picture = image.display().to_string().replace('\'', "");
    format!(
        "set terminal pngcairo size 900,900\n\
         set output '{picture}'\n\
         set multiplot layout 3,1 title 'Minimum-time trajectory'\n\
         set grid\n\
         set xlabel 't'\n\
         set ylabel 'x'\n\
         plot '{data}' using 1:2 with lines lw 2 title 'position'\n\
         set ylabel 'v'\n\
         plot '{data}' using 1:3 with lines lw 2 title 'velocity'\n\
         set ylabel 'a'\n\
         plot '{data}' using 1:4 with steps lw 2 title 'acceleration'\n\
         unset multiplot\n"
    )
}

pub fn write_default_script(script: &Path, data_file: &Path, image: &Path) -> io::Result<()> {
    fs::write(script, default_gnuplot_script(data_file, image))
}
