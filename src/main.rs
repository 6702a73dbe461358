use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use dicom_fusion::{
    ColorPair, FusionEngine, FusionError, FusionLoader, Interpolation, LogProgress, Orientation,
    Window,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrientationArg {
    Axial,
    Coronal,
    Sagittal,
}

impl From<OrientationArg> for Orientation {
    fn from(arg: OrientationArg) -> Self {
        match arg {
            OrientationArg::Axial => Orientation::Axial,
            OrientationArg::Coronal => Orientation::Coronal,
            OrientationArg::Sagittal => Orientation::Sagittal,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InterpolationArg {
    Linear,
    Nearest,
}

impl From<InterpolationArg> for Interpolation {
    fn from(arg: InterpolationArg) -> Self {
        match arg {
            InterpolationArg::Linear => Interpolation::Linear,
            InterpolationArg::Nearest => Interpolation::Nearest,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorPairArg {
    Grayscale,
    PurpleGreen,
    BlueYellow,
    RedCyan,
}

impl From<ColorPairArg> for ColorPair {
    fn from(arg: ColorPairArg) -> Self {
        match arg {
            ColorPairArg::Grayscale => ColorPair::Grayscale,
            ColorPairArg::PurpleGreen => ColorPair::PurpleGreen,
            ColorPairArg::BlueYellow => ColorPair::BlueYellow,
            ColorPairArg::RedCyan => ColorPair::RedCyan,
        }
    }
}

/// Fuse two DICOM series and write one blended slice as PNG
#[derive(Parser, Debug)]
#[command(name = "dicom-fusion")]
struct Args {
    /// Directory of the fixed (reference) series
    fixed: PathBuf,

    /// Directory of the moving (overlay) series
    moving: PathBuf,

    /// Output PNG
    #[arg(short, long, default_value = "fused.png")]
    output: PathBuf,

    #[arg(long, value_enum, default_value = "axial")]
    orientation: OrientationArg,

    /// Slice index, clamped into the fixed volume. Defaults to the centre slice
    #[arg(long, allow_negative_numbers = true)]
    index: Option<i64>,

    /// Rotation in degrees about x, y and z
    #[arg(long, num_args = 3, value_names = ["RX", "RY", "RZ"], allow_negative_numbers = true)]
    rotate: Option<Vec<f64>>,

    /// Translation in mm along x, y and z
    #[arg(long, num_args = 3, value_names = ["TX", "TY", "TZ"], allow_negative_numbers = true)]
    translate: Option<Vec<f64>>,

    /// Overlay opacity, 0 shows only the fixed volume
    #[arg(long, default_value_t = 0.5)]
    opacity: f32,

    #[arg(long, value_enum, default_value = "purple-green")]
    colors: ColorPairArg,

    #[arg(long, value_enum, default_value = "linear")]
    interpolation: InterpolationArg,

    /// Window centre
    #[arg(long, default_value_t = 40.0, allow_negative_numbers = true)]
    level: f32,

    /// Window width, at least 1
    #[arg(long, default_value_t = 400.0)]
    width: f32,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Print the user transform matrix
    #[arg(long)]
    show_matrix: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt().with_env_filter(filter).with_target(false).init();

    let Some(window) = Window::new(args.level, args.width) else {
        error!(level = args.level, width = args.width, "Invalid window");
        return ExitCode::FAILURE;
    };

    let loader = FusionLoader::new(&args.fixed, &args.moving);
    let engine = match tokio::task::spawn_blocking(move || loader.load(&LogProgress)).await {
        Ok(Ok(engine)) => engine,
        Ok(Err(_)) => return ExitCode::FAILURE,
        Err(err) => {
            error!(%err, "Loader task failed");
            return ExitCode::FAILURE;
        }
    };

    match render(engine, &args, &window) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "Failed to render fused slice");
            ExitCode::FAILURE
        }
    }
}

fn render(mut engine: FusionEngine, args: &Args, window: &Window) -> Result<(), FusionError> {
    engine.set_interpolation(args.interpolation.into());
    engine.set_opacity(args.opacity);
    engine.set_color_pair(args.colors.into());
    if let Some([rx, ry, rz]) = triple(args.rotate.as_deref()) {
        engine.set_rotation(rx, ry, rz);
    }
    if let Some([tx, ty, tz]) = triple(args.translate.as_deref()) {
        engine.set_translation(tx, ty, tz);
    }

    if args.show_matrix {
        println!("{}", engine.user_matrix());
    }

    let orientation = Orientation::from(args.orientation);
    let (min, max) = engine
        .slice_range(orientation)
        .ok_or(FusionError::NoFixedVolume)?;
    let index = args.index.unwrap_or((min + max) / 2);
    info!(?orientation, index, min, max, "rendering slice");

    let image = engine
        .render_slice(orientation, index, window)
        .ok_or(FusionError::EmptySlice)?;
    image.save(&args.output)?;
    info!(path = %args.output.display(), "fused slice written");
    Ok(())
}

fn triple(values: Option<&[f64]>) -> Option<[f64; 3]> {
    values.and_then(|v| <[f64; 3]>::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    use dicom_fusion::Volume;
    use nalgebra::{Point3, Vector3};
    use ndarray::Array3;
    use std::ffi::OsString;

    fn args(output: &std::path::Path) -> Args {
        let mut argv: Vec<OsString> = ["dicom-fusion", "fixed", "moving", "--output"]
            .into_iter()
            .map(OsString::from)
            .collect();
        argv.push(output.as_os_str().to_owned());
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn missing_fixed_volume_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("fused.png");
        let err = render(FusionEngine::new(), &args(&output), &Window::default()).unwrap_err();
        assert!(matches!(err, FusionError::NoFixedVolume));
        assert!(!output.exists());
    }

    #[test]
    fn fixed_volume_renders_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("fused.png");
        let mut engine = FusionEngine::new();
        let fixed = Volume::new(
            Array3::from_elem((3, 2, 2), 40.0),
            Vector3::repeat(1.0),
            Point3::origin(),
        );
        engine.load_fixed_volume(fixed, None).unwrap();
        render(engine, &args(&output), &Window::default()).unwrap();
        assert!(output.exists());
    }

    #[test]
    fn adjustments_need_three_values() {
        assert_eq!(triple(Some(&[1.0, 2.0, 3.0][..])), Some([1.0, 2.0, 3.0]));
        assert_eq!(triple(Some(&[1.0, 2.0][..])), None);
        assert_eq!(triple(None), None);
    }
}
