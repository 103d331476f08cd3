//! `clipflow check`: validate a blueprint against the built-in roles.

use std::path::Path;
use std::process::ExitCode;

use clipflow_blueprint::Blueprint;
use clipflow_core::RoleRegistry;

pub fn run(path: &Path) -> Result<ExitCode, Box<dyn std::error::Error>> {
    println!("🔍 Checking {}...", path.display());

    let blueprint = match clipflow_blueprint::load_file(path).and_then(|bp| {
        bp.validate()?;
        Ok(bp)
    }) {
        Ok(bp) => bp,
        Err(e) => {
            println!("   ❌ {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let registry = clipflow_roles::default_registry();
    let unknown = unknown_roles(&blueprint, &registry);

    println!("   ✅ {} ({} steps)", blueprint.name, blueprint.steps.len());
    for step in &blueprint.steps {
        println!(
            "   [{}] {:<20} -> {:<16} when {}",
            step.index, step.name, step.target_role, step.condition
        );
    }

    if unknown.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        println!();
        for role in &unknown {
            println!("   ⚠️  Role '{role}' is not registered; its steps will fail");
        }
        Ok(ExitCode::FAILURE)
    }
}

fn unknown_roles<'a>(blueprint: &'a Blueprint, registry: &RoleRegistry) -> Vec<&'a str> {
    blueprint
        .roles()
        .into_iter()
        .filter(|role| !registry.contains(role))
        .collect()
}
