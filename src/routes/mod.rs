// Route module decomposition, same shape as the teacher's: shared concerns
// live here, route functions are grouped by domain area in submodules.

pub mod control;
pub mod groups;
pub mod system;

pub use control::{direct_history, global_presence, mint_id, presence_probe, purge_conversation};
pub use groups::{
    add_members, admin_action, create_group, get_group, group_messages, leave_group,
    list_groups, list_members,
};
pub use system::{health, not_found, stats};
