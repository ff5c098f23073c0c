//! `refgraph inspect`: decode one image file and print what it contains.

use std::fmt::Write as _;
use std::path::Path;

use refgraph_metadata::{read_image, MetadataImage, TypeDef};

use crate::{GlobalArgs, InspectArgs, ReportFormat};

/// Runs `refgraph inspect`.
pub fn run(args: &InspectArgs, _global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let image = read_image(Path::new(&args.image))?;
    match args.format {
        ReportFormat::Text => print!("{}", render_text(&image)),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&image)?),
    }
    Ok(0)
}

fn render_text(image: &MetadataImage) -> String {
    let mut out = String::new();
    match image.identity() {
        Some(identity) => {
            let _ = writeln!(out, "{} {identity}", image.kind());
        }
        None => {
            let _ = writeln!(out, "{} {}", image.kind(), image.display_name());
        }
    }
    for module in image.modules() {
        let _ = writeln!(out, "  module {}", module.name);
        for (index, identity) in module.referenced_assemblies.iter().enumerate() {
            let _ = writeln!(out, "    ref[{index}] {identity}");
        }
        for ty in &module.types {
            render_type(&mut out, ty);
        }
    }
    out
}

fn render_type(out: &mut String, ty: &TypeDef) {
    let _ = write!(out, "    type {}", ty.full_name());
    if !ty.type_params.is_empty() {
        let _ = write!(out, "<{}>", ty.type_params.join(", "));
    }
    if let Some(base) = &ty.base {
        let _ = write!(out, " : {base}");
    }
    out.push('\n');
    for field in &ty.fields {
        let _ = writeln!(out, "      field {}: {}", field.name, field.ty);
    }
    for method in &ty.methods {
        let params: Vec<String> = method.params.iter().map(|p| format!("{}: {}", p.name, p.ty)).collect();
        let _ = write!(out, "      method {}({})", method.name, params.join(", "));
        if let Some(returns) = &method.return_type {
            let _ = write!(out, " -> {returns}");
        }
        out.push('\n');
    }
}
