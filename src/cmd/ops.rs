//! Built-in operation listing: `bulk ops`.

use bulk::ops::OperationRegistry;

pub fn cmd_ops() {
    let registry = OperationRegistry::builtin(".");
    println!("Built-in operations:");
    for op in registry.builtins() {
        println!("  {:<14} {}", op.id(), op.describe());
    }
    println!();
    println!("Any `use:` value containing a path separator runs as a script operation.");
}
