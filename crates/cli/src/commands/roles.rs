//! `clipflow roles`: list built-in roles.

pub fn run() {
    let registry = clipflow_roles::default_registry();
    println!("🧩 {} roles", registry.len());
    for info in registry.infos() {
        let accepts: Vec<&str> = info.accepts.iter().map(|c| c.as_str()).collect();
        println!("   {:<16} [{}]", info.name, accepts.join(", "));
        println!("   {:<16} {}", "", info.description);
    }
}
