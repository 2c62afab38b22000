//! Applying an accepted report back onto the database.

use tracing::debug;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::report::model::Report;

/// Folds an accepted report into the database: removed objects are
/// deleted (empty directory nodes collapse), added objects are inserted,
/// changed objects take their new FCO.
///
/// The changes land on a staged copy of the tree and move into the
/// database in one assignment, so a failure partway leaves the database
/// exactly as it was.
pub fn update_database(db: &mut Database, report: &Report) -> Result<()> {
    let mut staged = db.tree.clone();

    for (_, specs) in report.genres() {
        for spec in specs {
            for fco in spec.removed().iter() {
                let name = fco.name();
                {
                    let mut cursor = staged.cursor();
                    if !cursor.seek_to(name, false) || cursor.delete_fco().is_none() {
                        return Err(Error::NotInDatabase(name.as_string()));
                    }
                }
                staged.collapse(name);
            }

            for fco in spec.added().iter() {
                let mut cursor = staged.cursor();
                cursor.seek_to(fco.name(), true);
                cursor.write_fco(fco.clone());
            }

            for entry in spec.changed() {
                let mut cursor = staged.cursor();
                if !cursor.seek_to(entry.new.name(), false) || !cursor.has_fco_data() {
                    return Err(Error::NotInDatabase(entry.new.name().as_string()));
                }
                cursor.write_fco(entry.new.clone());
            }

            debug!(
                rule = %spec.rule().attrs().name,
                added = spec.added().len(),
                removed = spec.removed().len(),
                changed = spec.changed_len(),
                "applied spec to database"
            );
        }
    }

    db.tree = staged;
    Ok(())
}
