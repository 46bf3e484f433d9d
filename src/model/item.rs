use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Handle of a window owned by the external window-system watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u32);

/// Handle of a launch notification that has not produced a window yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StartupId(pub u32);

bitflags! {
    /// Window state bits reported by the item source.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WindowState: u32 {
        const MINIMIZED         = 1 << 0;
        const MAXIMIZED         = 1 << 1;
        const SHADED            = 1 << 2;
        const FULL_SCREEN       = 1 << 3;
        const KEPT_BELOW        = 1 << 4;
        const ALWAYS_ON_TOP     = 1 << 5;
        const ACTIVE            = 1 << 6;
        const DEMANDS_ATTENTION = 1 << 7;
        const ON_ALL_DESKTOPS   = 1 << 8;
    }
}

bitflags! {
    /// Window-manager actions the item source reports as available.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WindowActions: u32 {
        const MINIMIZE    = 1 << 0;
        const MAXIMIZE    = 1 << 1;
        const SHADE       = 1 << 2;
        const FULL_SCREEN = 1 << 3;
        const MOVE        = 1 << 4;
        const RESIZE      = 1 << 5;
        const CLOSE       = 1 << 6;
    }
}

bitflags! {
    /// What changed in a `TaskChanged` notification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TaskChanges: u32 {
        const STATE    = 1 << 0;
        const DESKTOP  = 1 << 1;
        const GEOMETRY = 1 << 2;
        const NAME     = 1 << 3;
        const ICON     = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowType {
    #[default]
    Normal,
    Dialog,
    Override,
    Utility,
}

/// An icon reference, opaque to the engine. Empty until the backing item
/// resolves one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Icon(pub String);

impl Icon {
    pub fn named(name: &str) -> Self {
        Icon(name.to_owned())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// RGBA color attached to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8, pub u8);

impl Color {
    pub const TRANSPARENT: Color = Color(0, 0, 0, 0);
    pub const RED: Color = Color(255, 0, 0, 255);
    pub const BLUE: Color = Color(0, 0, 255, 255);
    pub const GREEN: Color = Color(0, 255, 0, 255);
    pub const YELLOW: Color = Color(255, 255, 0, 255);
}

/// Per-window attribute snapshot delivered with every add/change event.
///
/// The engine never calls back into the window system; it works off the
/// latest snapshot it has seen for each window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub title: String,
    /// Stable key identifying "windows of the same application".
    pub program_identity: String,
    pub icon: Icon,
    /// 1-based virtual desktop; 0 means "on all desktops".
    pub desktop: i32,
    pub screen: i32,
    pub window_type: WindowType,
    pub show_in_taskbar: bool,
    pub state: WindowState,
    pub actions: WindowActions,
    /// Startup placeholder this window resolves, if the watcher matched one.
    pub startup: Option<StartupId>,
}

impl Default for TaskInfo {
    fn default() -> Self {
        Self {
            title: String::new(),
            program_identity: String::new(),
            icon: Icon::default(),
            desktop: 1,
            screen: 0,
            window_type: WindowType::Normal,
            show_in_taskbar: true,
            state: WindowState::empty(),
            actions: WindowActions::all(),
            startup: None,
        }
    }
}

/// Attributes of a launch placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupInfo {
    pub title: String,
    pub icon: Icon,
    pub desktop: i32,
}

/// Leaf of the group tree: one window, or transiently one startup
/// placeholder that is rehomed onto the window once it appears.
#[derive(Debug, Clone)]
pub enum TaskItem {
    Window { id: WindowId, info: TaskInfo },
    Startup { id: StartupId, info: StartupInfo },
}

impl TaskItem {
    pub fn window(id: WindowId, info: TaskInfo) -> Self {
        TaskItem::Window { id, info }
    }

    pub fn startup(id: StartupId, info: StartupInfo) -> Self {
        TaskItem::Startup { id, info }
    }

    pub fn is_startup(&self) -> bool {
        matches!(self, TaskItem::Startup { .. })
    }

    pub fn window_id(&self) -> Option<WindowId> {
        match self {
            TaskItem::Window { id, .. } => Some(*id),
            TaskItem::Startup { .. } => None,
        }
    }

    pub fn startup_id(&self) -> Option<StartupId> {
        match self {
            TaskItem::Window { .. } => None,
            TaskItem::Startup { id, .. } => Some(*id),
        }
    }

    /// Replaces a startup placeholder with the real window, in place, so the
    /// item keeps its position in the tree.
    pub fn resolve_window(&mut self, id: WindowId, info: TaskInfo) {
        *self = TaskItem::Window { id, info };
    }

    pub fn info(&self) -> Option<&TaskInfo> {
        match self {
            TaskItem::Window { info, .. } => Some(info),
            TaskItem::Startup { .. } => None,
        }
    }

    pub fn info_mut(&mut self) -> Option<&mut TaskInfo> {
        match self {
            TaskItem::Window { info, .. } => Some(info),
            TaskItem::Startup { .. } => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TaskItem::Window { info, .. } => &info.title,
            TaskItem::Startup { info, .. } => &info.title,
        }
    }

    pub fn icon(&self) -> &Icon {
        match self {
            TaskItem::Window { info, .. } => &info.icon,
            TaskItem::Startup { info, .. } => &info.icon,
        }
    }

    /// `None` for startup placeholders, which have no program identity yet.
    pub fn program_identity(&self) -> Option<&str> {
        match self {
            TaskItem::Window { info, .. } => Some(&info.program_identity),
            TaskItem::Startup { .. } => None,
        }
    }

    pub fn desktop(&self) -> i32 {
        match self {
            TaskItem::Window { info, .. } => info.desktop,
            TaskItem::Startup { info, .. } => info.desktop,
        }
    }

    pub fn is_on_all_desktops(&self) -> bool {
        self.has_state(WindowState::ON_ALL_DESKTOPS)
    }

    pub fn is_on_desktop(&self, desktop: i32) -> bool {
        self.desktop() == desktop || self.is_on_all_desktops() || self.desktop() == 0
    }

    pub fn is_on_screen(&self, screen: i32) -> bool {
        match self {
            TaskItem::Window { info, .. } => info.screen == screen,
            TaskItem::Startup { .. } => true,
        }
    }

    fn has_state(&self, state: WindowState) -> bool {
        match self {
            TaskItem::Window { info, .. } => info.state.contains(state),
            TaskItem::Startup { .. } => false,
        }
    }

    pub fn is_minimized(&self) -> bool {
        self.has_state(WindowState::MINIMIZED)
    }

    pub fn is_maximized(&self) -> bool {
        self.has_state(WindowState::MAXIMIZED)
    }

    pub fn is_shaded(&self) -> bool {
        self.has_state(WindowState::SHADED)
    }

    pub fn is_full_screen(&self) -> bool {
        self.has_state(WindowState::FULL_SCREEN)
    }

    pub fn is_kept_below(&self) -> bool {
        self.has_state(WindowState::KEPT_BELOW)
    }

    pub fn is_always_on_top(&self) -> bool {
        self.has_state(WindowState::ALWAYS_ON_TOP)
    }

    pub fn is_active(&self) -> bool {
        self.has_state(WindowState::ACTIVE)
    }

    pub fn demands_attention(&self) -> bool {
        self.has_state(WindowState::DEMANDS_ATTENTION)
    }

    pub fn supports_action(&self, action: WindowActions) -> bool {
        match self {
            TaskItem::Window { info, .. } => info.actions.contains(action),
            TaskItem::Startup { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> TaskInfo {
        TaskInfo {
            title: "Inbox".into(),
            program_identity: "mail".into(),
            desktop: 2,
            state: WindowState::MINIMIZED | WindowState::DEMANDS_ATTENTION,
            ..TaskInfo::default()
        }
    }

    #[test]
    fn window_predicates() {
        let item = TaskItem::window(WindowId(1), info());
        assert_eq!(item.name(), "Inbox");
        assert_eq!(item.program_identity(), Some("mail"));
        assert!(item.is_minimized());
        assert!(item.demands_attention());
        assert!(!item.is_maximized());
        assert!(item.is_on_desktop(2));
        assert!(!item.is_on_desktop(1));
    }

    #[test]
    fn on_all_desktops() {
        let mut i = info();
        i.state |= WindowState::ON_ALL_DESKTOPS;
        let item = TaskItem::window(WindowId(1), i);
        assert!(item.is_on_desktop(1));
        assert!(item.is_on_desktop(7));
    }

    #[test]
    fn startup_defaults() {
        let item = TaskItem::startup(StartupId(3), StartupInfo {
            title: "mail".into(),
            icon: Icon::named("mail"),
            desktop: 1,
        });
        assert!(item.is_startup());
        assert_eq!(item.program_identity(), None);
        assert!(!item.is_minimized());
        assert!(!item.supports_action(WindowActions::CLOSE));
    }

    #[test]
    fn startup_resolution_keeps_identity() {
        let mut item = TaskItem::startup(StartupId(3), StartupInfo {
            title: "mail".into(),
            icon: Icon::default(),
            desktop: 1,
        });
        item.resolve_window(WindowId(9), info());
        assert!(!item.is_startup());
        assert_eq!(item.window_id(), Some(WindowId(9)));
        assert_eq!(item.program_identity(), Some("mail"));
    }
}
