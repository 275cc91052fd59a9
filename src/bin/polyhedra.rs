//! `polyhedra` CLI (§6.2): reads one or more mesh files, performs a fixed
//! sequence of operations selected by flags, and optionally writes the
//! result and/or prints mass properties. Operation order is fixed in
//! code, not argv order: scale → simplify → convex hull → plane cut →
//! convex decomposition → mass properties.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use glam::Vec3;
use tracing::info;

use polyhedra::error::Result;
use polyhedra::mesh::indexed::MeshList;
use polyhedra::{convex_decomp, hull, io, mass_properties, plane_cut, simplify};

/// Convert and operate on polyhedra with triangular faces.
#[derive(Parser, Debug)]
#[command(name = "polyhedra", about = "Convert and operate on polyhedra with triangular faces")]
struct Args {
    /// Calculate the convex hull.
    #[arg(short = 'c')]
    convex_hull: bool,

    /// Perform approximate surface decomposition into convex polyhedra.
    #[arg(short = 'd', value_name = "THRESHOLD")]
    decomp: Option<f32>,

    /// Calculate mass properties of each polyhedron individually.
    #[arg(short = 'm')]
    mass_properties: bool,

    /// Save resulting polyhedra to this file. Pass "" to suppress saving.
    #[arg(short = 'o', default_value = "out.obj")]
    out: String,

    /// Cut the polyhedra along a plane: normal (x, y, z), offset d.
    #[arg(short = 'p', value_name = "X,Y,Z,D", value_parser = parse_plane)]
    cut: Option<(f32, f32, f32, f32)>,

    /// Quiet: suppress status output.
    #[arg(short = 'q')]
    quiet: bool,

    /// Simplify each polyhedron to no more than this many faces.
    #[arg(short = 's', value_name = "FACES")]
    simplify: Option<usize>,

    /// Scale each polyhedron by this factor.
    #[arg(short = 'x', value_name = "SCALE")]
    scale: Option<f32>,

    /// Input files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn parse_plane(s: &str) -> std::result::Result<(f32, f32, f32, f32), String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 4 {
        return Err(format!("expecting comma separated list of 4 floats: '{s}'"));
    }
    let mut vals = [0.0f32; 4];
    for (slot, p) in vals.iter_mut().zip(parts.iter()) {
        *slot = p.trim().parse::<f32>().map_err(|e| e.to_string())?;
    }
    Ok((vals[0], vals[1], vals[2], vals[3]))
}

fn run(args: Args) -> Result<()> {
    let mut data = MeshList::new();
    for path in &args.inputs {
        let meshes = io::read_file(path)?;
        for mesh in meshes {
            data.append(mesh);
        }
    }

    if let Some(scale) = args.scale {
        if !args.quiet {
            println!("\nScaling");
        }
        let scaled: MeshList = data
            .into_iter()
            .map(|m| scale_mesh(m, scale))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .collect();
        data = scaled;
    }

    if let Some(target_faces) = args.simplify {
        if !args.quiet {
            println!("\nSimplifying");
        }
        let simplified: MeshList = data
            .into_iter()
            .map(|m| simplify::simplify(&m, target_faces, 0.0))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .collect();
        data = simplified;
    }

    if args.convex_hull {
        if !args.quiet {
            println!("\nCalculating convex hulls");
        }
        let hulled: MeshList = data
            .into_iter()
            .map(|m| hull::convex_hull_3d(&m))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .collect();
        data = hulled;
    }

    if let Some((x, y, z, d)) = args.cut {
        let normal = Vec3::new(x, y, z);
        let mut out = MeshList::new();
        for (count, mesh) in data.into_iter().enumerate() {
            if !args.quiet {
                println!("Cutting polyhedra {count} along plane");
            }
            let pieces = plane_cut::plane_cut(&mesh, normal, d)?;
            if !args.quiet {
                println!("  -> Split into {} polyhedra", pieces.len());
            }
            for p in pieces {
                out.append(p);
            }
        }
        data = out;
    }

    if let Some(tau) = args.decomp {
        let mut out = MeshList::new();
        for (count, mesh) in data.into_iter().enumerate() {
            if !args.quiet {
                println!("Decomposing polyhedra {count}");
            }
            let pieces = convex_decomp::convex_decomp(&mesh, tau)?;
            if !args.quiet {
                println!("  -> Split into {} convex polyhedra", pieces.len());
            }
            for p in pieces {
                out.append(p);
            }
        }
        data = out;
    }

    if args.mass_properties {
        if !args.quiet {
            println!("\nCalculating mass properties");
        }
        for (count, mesh) in data.iter().enumerate() {
            let mp = mass_properties::mass_properties(mesh)?;
            println!("Properties for polyhedra {count}:");
            println!("  Vertices: {}, Indices: {}", mesh.num_vertices(), mesh.num_indices());
            println!("  Volume:         {}", mp.volume);
            println!(
                "  Center of mass: ({}, {}, {})",
                mp.centroid.x, mp.centroid.y, mp.centroid.z
            );
            println!("  Inertia Tensor:");
            for row in mp.inertia {
                println!("    [{:20}, {:20}, {:20}]", row[0], row[1], row[2]);
            }
            println!();
        }
    }

    if !args.out.is_empty() {
        io::write_file(&PathBuf::from(&args.out), &data)?;
        info!("wrote {}", args.out);
    }

    Ok(())
}

/// `Transform` is rotation + translation only (§C.1); scale is applied
/// directly to each vertex's leading 3 position floats.
fn scale_mesh(mesh: polyhedra::mesh::indexed::IndexedMesh, scale: f32) -> Result<polyhedra::mesh::indexed::IndexedMesh> {
    let fpv = mesh.floats_per_vertex();
    let kind = mesh.primitive_kind();
    let mut out = polyhedra::mesh::indexed::IndexedMesh::new(fpv, kind);
    for &index in mesh.indices() {
        let rec = mesh.vertex(index);
        let mut scaled: Vec<f32> = rec.to_vec();
        for v in scaled.iter_mut().take(3) {
            *v *= scale;
        }
        out.add(&scaled)?;
    }
    out.finalize();
    Ok(out)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.quiet {
        tracing_subscriber::EnvFilter::new("error")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
