//! Text rendering of a database.

use std::fmt::Write as _;

use crate::db::Database;
use crate::fco::name::FcoName;
use crate::fco::prop::{HashDisplay, Prop, PROP_COUNT};

use super::text::{escape_name, format_time};

/// Renders the database: header, the policy snapshot, then every stored
/// object with its properties, in name order.
pub fn render_db(db: &Database, hashes: HashDisplay) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Baseline database");
    let _ = writeln!(out, "=================");
    let _ = writeln!(out, "Created:       {}", format_time(db.created_at()));
    let _ = writeln!(out, "Object count:  {}", db.tree.record_count());
    let _ = writeln!(out, "Policy rules:  {}", db.policy().len());
    let _ = writeln!(out);

    for rule in db.policy().iter() {
        let _ = writeln!(
            out,
            "Rule \"{}\" -> \"{}\" {}",
            rule.attrs().name,
            escape_name(&rule.start_point().as_string()),
            rule.prop_mask(),
        );
    }
    let _ = writeln!(out);

    db.tree.for_each_record(&FcoName::new(), &mut |name, fco| {
        let _ = writeln!(out, "\"{}\"", escape_name(&name.as_string()));
        for idx in 0..PROP_COUNT {
            let Some(prop) = Prop::from_index(idx) else { continue };
            if let Ok(value) = fco.get(prop) {
                let _ = writeln!(out, "  {:<14} {}", prop.display_name(), value.render(hashes));
            }
        }
    });
    out
}
