//! `primative` CLI (§6.3): generates a single primitive polyhedron and
//! writes it to a file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use polyhedra::error::Result;
use polyhedra::mesh::indexed::MeshList;
use polyhedra::{io, primitives};

#[derive(Copy, Clone, Debug, ValueEnum)]
#[value(rename_all = "lowercase")]
enum PrimKind {
    Cube,
    Cylinder,
    Uvsphere,
    Icosphere,
}

/// Generate a primitive polyhedron.
#[derive(Parser, Debug)]
#[command(name = "primative", about = "Generate primitive shapes")]
struct Args {
    /// Type to generate.
    #[arg(short = 't')]
    kind: PrimKind,

    /// Parameter that controls how the shape is generated (meaning depends on `-t`).
    #[arg(short = 'n', default_value_t = 0)]
    n: u32,

    /// Size of primitive in the x direction (diameter for non-cube types).
    #[arg(short = 'x', default_value_t = 1.0)]
    x: f32,

    /// Size of primitive in the y direction (cube only).
    #[arg(short = 'y', default_value_t = 1.0)]
    y: f32,

    /// Size of primitive in the z direction (cube/cylinder only).
    #[arg(short = 'z', default_value_t = 1.0)]
    z: f32,

    /// Output file.
    out: PathBuf,
}

fn run(args: Args) -> Result<()> {
    let n_specified = args.n != 0;
    let mesh = match args.kind {
        PrimKind::Cube => primitives::cube(args.x / 2.0, args.y / 2.0, args.z / 2.0)?,
        PrimKind::Cylinder => primitives::cylinder(args.x / 2.0, args.z, if n_specified { args.n } else { 3 })?,
        PrimKind::Uvsphere => {
            let n = if n_specified { args.n } else { 3 };
            primitives::uvsphere(args.x / 2.0, n, n)?
        }
        PrimKind::Icosphere => primitives::icosphere(args.x / 2.0, args.n)?,
    };

    let mut list = MeshList::new();
    list.append(mesh);
    io::write_file(&args.out, &list)?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")))
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
