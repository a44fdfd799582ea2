//! partkit CLI - inspect content files and evaluate model slots
//!
//! Evaluation runs against an in-memory scene with stand-in geometry, so
//! content can be checked without the host engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use partkit::{
    AssetNode, AttachNodeBaseData, AttachNodes, DefinitionCatalog,
    EngineSettings, LayoutCatalog, ModelDefinition, ModelDefinitionLayoutOptions, ModelModule,
    ModelOrientation, SceneGraph, SceneHost, DEFAULT_LAYOUT,
};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "partkit")]
#[command(about = "Inspect partkit content and evaluate model slots", long_about = None)]
struct Cli {
    /// Log filter (overrides RUST_LOG and the settings file)
    #[arg(long, global = true)]
    log: Option<String>,

    /// Engine settings file (partkit.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the definitions and layouts in a content file
    List {
        /// Content file
        file: PathBuf,
    },
    /// Show a definition's dimensions, profiles, nodes and segments
    Info {
        /// Content file
        file: PathBuf,
        /// Definition name
        definition: String,
    },
    /// Instantiate a definition in a slot and print the derived geometry
    Eval {
        /// Content file
        file: PathBuf,
        /// Definition name
        definition: String,
        /// Layout name
        #[arg(short, long)]
        layout: Option<String>,
        /// Slot orientation (TOP, CENTRAL, BOTTOM)
        #[arg(short, long, default_value = "TOP")]
        orientation: String,
        /// Target diameter
        #[arg(short, long)]
        diameter: Option<f64>,
        /// Target height
        #[arg(long)]
        height: Option<f64>,
        /// Slot origin along the mounting axis
        #[arg(long, default_value_t = 0.0)]
        origin: f64,
        /// Print the persisted slot state as JSON instead
        #[arg(long)]
        json: bool,
    },
}

struct Content {
    definitions: DefinitionCatalog,
    layouts: LayoutCatalog,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => EngineSettings::load(path)
            .with_context(|| format!("reading settings {}", path.display()))?,
        None => EngineSettings::default(),
    };
    init_logging(cli.log.as_deref(), &settings);

    match cli.command {
        Commands::List { file } => {
            list(&file)?;
        }
        Commands::Info { file, definition } => {
            info(&file, &definition)?;
        }
        Commands::Eval {
            file,
            definition,
            layout,
            orientation,
            diameter,
            height,
            origin,
            json,
        } => {
            let orientation = ModelOrientation::parse(&orientation)
                .ok_or_else(|| anyhow::anyhow!("Unknown orientation: {}", orientation))?;
            let request = EvalRequest {
                layout,
                orientation,
                diameter,
                height,
                origin,
            };
            eval(&file, &definition, &request, &settings, json)?;
        }
    }

    Ok(())
}

fn init_logging(flag: Option<&str>, settings: &EngineSettings) {
    let filter = match flag {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .compact()
        .init();
}

fn load(file: &Path) -> Result<Content> {
    let root = partkit_cfg::parse_file(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let mut definitions = DefinitionCatalog::new();
    definitions.load(&root);
    let mut layouts = LayoutCatalog::new();
    layouts.load(&root);
    Ok(Content {
        definitions,
        layouts,
    })
}

fn list(file: &Path) -> Result<()> {
    let content = load(file)?;

    println!("partkit content: {}", file.display());
    println!("\nDefinitions ({}):", content.definitions.len());
    for name in content.definitions.names() {
        if let Some(def) = content.definitions.get(name) {
            println!(
                "  {} - {} ({} x {}, {})",
                def.name, def.title, def.diameter, def.height, def.orientation
            );
        }
    }
    println!("\nLayouts ({}):", content.layouts.len());
    for name in content.layouts.names() {
        let layout = content.layouts.find(name);
        println!("  {} - {} ({} positions)", layout.name, layout.title, layout.position_count());
    }
    Ok(())
}

fn info(file: &Path, name: &str) -> Result<()> {
    let content = load(file)?;
    let def = content.definitions.require(name)?;

    println!("{} ({})", def.name, def.title);
    println!("  Orientation: {}", def.orientation);
    println!("  Height: {}", def.height);
    println!(
        "  Diameter: {} (upper {}, lower {})",
        def.diameter, def.upper_diameter, def.lower_diameter
    );
    println!(
        "  Vertical scale: {} .. {}",
        def.min_vertical_scale, def.max_vertical_scale
    );
    println!("  Mass: {}  Cost: {}  Volume: {}", def.mass, def.cost, def.volume);

    println!("\nProfiles:");
    println!("  upper: {}", def.upper_profiles.join(", "));
    println!("  lower: {}", def.lower_profiles.join(", "));
    println!("  accepts above: {}", def.compatible_upper_profiles.join(", "));
    println!("  accepts below: {}", def.compatible_lower_profiles.join(", "));

    println!("\nAttach nodes:");
    print_base_node("top", def.top_node.as_ref());
    print_base_node("bottom", def.bottom_node.as_ref());
    for (i, node) in def.body_nodes.iter().enumerate() {
        print_base_node(&format!("body{}", i), Some(node));
    }
    print_base_node("surface", Some(&def.surface_node));

    println!("\nSub-models:");
    for entry in &def.sub_models {
        println!("  {}", entry.model_name);
    }
    if let Some(compound) = &def.compound {
        println!("\nCompound segments:");
        for t in &compound.transforms {
            println!(
                "  {} height {}{}",
                t.name,
                t.height,
                if t.can_scale_height { " (scalable)" } else { "" }
            );
        }
    }
    println!("\nTexture sets:");
    for set in &def.texture_sets {
        let marker = if def.default_texture_set.as_deref() == Some(set.name.as_str()) {
            " (default)"
        } else {
            ""
        };
        println!("  {}{}", set.name, marker);
    }
    if !def.ancillary.is_empty() {
        println!("\nAncillary records: {}", ancillary_summary(&def));
    }
    Ok(())
}

fn print_base_node(label: &str, node: Option<&AttachNodeBaseData>) {
    match node {
        Some(n) => println!(
            "  {}: ({}, {}, {}) dir ({}, {}, {}) size {}",
            label,
            n.position.x,
            n.position.y,
            n.position.z,
            n.orientation.x,
            n.orientation.y,
            n.orientation.z,
            n.size
        ),
        None => println!("  {}: disabled", label),
    }
}

fn ancillary_summary(def: &ModelDefinition) -> String {
    let a = &def.ancillary;
    [
        ("animation", a.animation.len()),
        ("rcs", a.rcs.len()),
        ("engine thrust", a.engine_thrust.len()),
        ("engine transform", a.engine_transform.len()),
        ("fairing", a.fairing.len()),
        ("solar", a.solar.len()),
        ("constraint", a.constraint.len()),
    ]
    .iter()
    .filter(|(_, n)| *n > 0)
    .map(|(k, n)| format!("{} {}", n, k))
    .collect::<Vec<_>>()
    .join(", ")
}

struct EvalRequest {
    layout: Option<String>,
    orientation: ModelOrientation,
    diameter: Option<f64>,
    height: Option<f64>,
    origin: f64,
}

fn eval(
    file: &Path,
    name: &str,
    request: &EvalRequest,
    settings: &EngineSettings,
    json: bool,
) -> Result<()> {
    let content = load(file)?;
    let def = content.definitions.require(name)?;

    let mut layouts = content.layouts.find_many(&[settings.default_layout.as_str()]);
    if layouts.is_empty() {
        layouts.push(content.layouts.find(DEFAULT_LAYOUT));
    }
    if let Some(layout) = &request.layout {
        let requested = content.layouts.require(layout)?;
        if !layouts.iter().any(|l| l.name == requested.name) {
            layouts.push(requested);
        }
    }
    let options = ModelDefinitionLayoutOptions::new(def.clone(), layouts)?;
    let mut module = ModelModule::new("slot", request.orientation, vec![options], settings)?;

    match (request.height, request.diameter) {
        (Some(h), Some(d)) => module.set_scale_for_height_and_diameter(h, d),
        (None, Some(d)) => module.set_scale_for_diameter(d),
        (Some(h), None) => module.set_scale(1.0, h / def.height),
        (None, None) => {}
    }
    module.set_position(request.origin);

    let mut scene = stand_in_scene(&def);
    let part = scene.create_empty("part", None);
    if let Some(layout) = &request.layout {
        module.select_layout(&mut scene, layout);
    }
    module.setup_model(&mut scene, part);

    if json {
        println!("{}", serde_json::to_string_pretty(&module.state())?);
        return Ok(());
    }

    let mut nodes = AttachNodes::new();
    module.update_attach_node_top(&mut nodes, "top", false);
    module.update_attach_node_bottom(&mut nodes, "bottom", false);
    let body_names: Vec<String> = (0..def.body_nodes.len()).map(|i| format!("body{}", i)).collect();
    module.update_attach_node_body(&mut nodes, &body_names, false);
    module.update_surface_attach_node(&mut nodes, "surface", false);

    println!(
        "{} in {} slot, layout {}",
        def.name,
        module.orientation(),
        module.layout().name
    );
    println!(
        "  Scale: horizontal {:.4}, vertical {:.4}{}",
        module.horizontal_scale(),
        module.vertical_scale(),
        if module.should_invert() { " (inverted)" } else { "" }
    );
    println!(
        "  Extents: top {:.4}, center {:.4}, bottom {:.4}",
        module.top(),
        module.center(),
        module.bottom()
    );
    println!(
        "  Size: height {:.4}, diameter {:.4} (upper {:.4}, lower {:.4})",
        module.current_height(),
        module.current_diameter(),
        module.upper_diameter(),
        module.lower_diameter()
    );
    println!("  Placement offset: {:.4}", module.placement_offset());
    println!(
        "  Profiles: upper [{}], lower [{}]",
        module.upper_profiles().join(", "),
        module.lower_profiles().join(", ")
    );

    println!("\nAttach nodes:");
    for node in nodes.iter() {
        println!(
            "  {}: ({:.4}, {:.4}, {:.4}) dir ({:.2}, {:.2}, {:.2}) size {}",
            node.name,
            node.position.x,
            node.position.y,
            node.position.z,
            node.orientation.x,
            node.orientation.y,
            node.orientation.z,
            node.size
        );
    }

    if let Some(compound) = &def.compound {
        println!("\nCompound segments:");
        let placements = compound.distribute(
            module.current_height(),
            module.horizontal_scale(),
            def.orientation.stack_direction(),
        );
        for p in placements {
            println!(
                "  {}: at {:.4}, height {:.4}, scale {:.4}",
                p.name,
                p.position.y,
                p.segment_height,
                p.height_scale
            );
        }
    }

    println!("\nStats ({} positions, average layout scale {:.4}):", module.position_count(), module.average_layout_scale());
    println!("  Mass: {:.4}", module.module_mass());
    println!("  Cost: {:.4}", module.module_cost());
    println!("  Volume: {:.4}", module.module_volume());

    if let Some(root) = module.root() {
        debug!(nodes = scene.descendants(root).len(), "stand-in scene built");
    }
    Ok(())
}

/// Register a stand-in asset for every geometry reference of `def`: a group
/// holding one mesh per name the definition filters, merges or drives.
fn stand_in_scene(def: &ModelDefinition) -> SceneGraph {
    let mut scene = SceneGraph::new();
    let mut driven: Vec<String> = def
        .merge_groups
        .iter()
        .flat_map(|g| g.meshes.iter().cloned())
        .collect();
    if let Some(compound) = &def.compound {
        driven.extend(compound.transforms.iter().map(|t| t.name.clone()));
    }
    for entry in &def.sub_models {
        let mut names = entry.keep_meshes.clone();
        names.extend(driven.iter().cloned());
        if names.is_empty() {
            names.push(entry.model_name.clone());
        }
        names.dedup();
        let children = names.into_iter().map(AssetNode::mesh).collect();
        scene.register_asset(entry.model_name.clone(), AssetNode::group(entry.model_name.clone(), children));
    }
    scene
}
