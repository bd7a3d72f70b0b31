//! Code-side behavior for abilities whose data needs hooks or code rules.

mod cryoseism;

pub use cryoseism::CryoseismHooks;

use action_core::ActionTemplate;

/// Attaches the code hooks and rules registered for the template's action.
///
/// Actions without code behavior are returned unchanged.
pub fn install(template: ActionTemplate) -> ActionTemplate {
    match template.name() {
        cryoseism::NAME => cryoseism::install(template),
        _ => template,
    }
}
