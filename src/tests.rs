use crate::common::config::GroupManagerSettings;
use crate::grouping::GroupingPolicy;
use crate::manager::{GroupManager, TaskEvent};
use crate::model::item::{StartupId, StartupInfo, TaskChanges, TaskInfo, WindowId, WindowState};
use crate::model::tree::{GroupEvent, ItemId};
use crate::sorting::SortingPolicy;

fn info(identity: &str) -> TaskInfo {
    TaskInfo { program_identity: identity.to_owned(), ..TaskInfo::default() }
}

fn info_on(identity: &str, desktop: i32) -> TaskInfo {
    TaskInfo { desktop, ..info(identity) }
}

fn manager(settings: GroupManagerSettings) -> GroupManager {
    GroupManager::new(settings)
}

fn groups_at_root(m: &GroupManager) -> Vec<ItemId> {
    m.tree()
        .members(m.root_group())
        .iter()
        .copied()
        .filter(|i| m.tree().is_group(*i))
        .collect()
}

mod tree_invariants {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn every_visible_item_has_exactly_one_parent() {
        let mut m = manager(GroupManagerSettings {
            grouping_strategy: GroupingPolicy::ProgramGrouping,
            ..GroupManagerSettings::default()
        });
        for n in 1..=6 {
            let identity = if n % 2 == 0 { "editor" } else { "browser" };
            m.handle_event(TaskEvent::TaskAdded(WindowId(n), info(identity)));
        }
        let tree = m.tree();
        let mut seen = Vec::new();
        let mut stack = vec![m.root_group()];
        while let Some(id) = stack.pop() {
            for member in tree.members(id) {
                assert!(!seen.contains(member), "item reachable twice");
                seen.push(*member);
                assert_eq!(tree.parent(*member), Some(id));
                stack.push(*member);
            }
        }
        assert_eq!(seen.len(), 8, "6 tasks plus 2 program groups");
    }

    #[test]
    fn events_cover_every_structural_change() {
        let mut m = manager(GroupManagerSettings::default());
        m.take_events();
        m.handle_event(TaskEvent::TaskAdded(WindowId(1), info("a")));
        let item = m.item_for_window(WindowId(1)).unwrap();
        let root = m.root_group();
        assert_eq!(m.take_events(), vec![GroupEvent::ItemAdded { group: root, item }]);

        m.handle_event(TaskEvent::TaskRemoved(WindowId(1)));
        assert_eq!(m.take_events(), vec![GroupEvent::ItemRemoved { group: root, item }]);
    }
}

mod program_grouping_scenarios {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn mixed_programs_cluster_per_identity() {
        let mut m = manager(GroupManagerSettings {
            grouping_strategy: GroupingPolicy::ProgramGrouping,
            ..GroupManagerSettings::default()
        });
        m.handle_event(TaskEvent::TaskAdded(WindowId(1), info("editor")));
        m.handle_event(TaskEvent::TaskAdded(WindowId(2), info("editor")));
        m.handle_event(TaskEvent::TaskAdded(WindowId(3), info("browser")));

        let groups = groups_at_root(&m);
        assert_eq!(groups.len(), 1);
        assert_eq!(m.tree().name(groups[0]), "editor");
        assert_eq!(m.tree().members(groups[0]).len(), 2);
        let browser = m.item_for_window(WindowId(3)).unwrap();
        assert_eq!(m.tree().parent(browser), Some(m.root_group()));
    }

    #[test]
    fn group_of_one_never_survives() {
        let mut m = manager(GroupManagerSettings {
            grouping_strategy: GroupingPolicy::ProgramGrouping,
            ..GroupManagerSettings::default()
        });
        for n in 1..=3 {
            m.handle_event(TaskEvent::TaskAdded(WindowId(n), info("term")));
        }
        m.handle_event(TaskEvent::TaskRemoved(WindowId(1)));
        assert_eq!(groups_at_root(&m).len(), 1, "two terms still group");

        m.handle_event(TaskEvent::TaskRemoved(WindowId(2)));
        assert!(groups_at_root(&m).is_empty(), "a lone term stands alone");
        let last = m.item_for_window(WindowId(3)).unwrap();
        assert_eq!(m.tree().parent(last), Some(m.root_group()));
    }

    #[test]
    fn policy_swap_and_back_reaches_the_same_shape() {
        let mut m = manager(GroupManagerSettings {
            grouping_strategy: GroupingPolicy::ProgramGrouping,
            ..GroupManagerSettings::default()
        });
        for n in 1..=4 {
            m.handle_event(TaskEvent::TaskAdded(WindowId(n), info("editor")));
        }
        assert_eq!(groups_at_root(&m).len(), 1);

        m.set_grouping_policy(GroupingPolicy::NoGrouping);
        assert!(groups_at_root(&m).is_empty());
        assert_eq!(m.tree().members(m.root_group()).len(), 4);

        m.set_grouping_policy(GroupingPolicy::ProgramGrouping);
        let groups = groups_at_root(&m);
        assert_eq!(groups.len(), 1);
        assert_eq!(m.tree().members(groups[0]).len(), 4);
    }
}

mod manual_grouping_scenarios {
    use pretty_assertions::assert_eq;

    use super::*;

    fn manual_manager() -> GroupManager {
        manager(GroupManagerSettings {
            grouping_strategy: GroupingPolicy::ManualGrouping,
            show_only_current_desktop: true,
            ..GroupManagerSettings::default()
        })
    }

    #[test]
    fn desktop_round_trip_restores_groups() {
        let mut m = manual_manager();
        m.handle_event(TaskEvent::TaskAdded(WindowId(1), info_on("a", 1)));
        m.handle_event(TaskEvent::TaskAdded(WindowId(2), info_on("b", 1)));
        m.handle_event(TaskEvent::TaskAdded(WindowId(3), info_on("c", 1)));
        let x = m.item_for_window(WindowId(1)).unwrap();
        let y = m.item_for_window(WindowId(2)).unwrap();
        assert!(m.manual_grouping_request_list(&[x, y]));
        let g = m.tree().parent(x).unwrap();
        let name = m.tree().name(g).to_owned();
        let color = m.tree().group(g).unwrap().color();

        m.handle_event(TaskEvent::DesktopChanged(2));
        assert!(m.tree().members(m.root_group()).iter().all(|i| m.tree().is_group(*i)));

        m.handle_event(TaskEvent::DesktopChanged(1));
        assert_eq!(m.tree().parent(x), Some(g));
        assert_eq!(m.tree().parent(y), Some(g));
        let z = m.item_for_window(WindowId(3)).unwrap();
        assert_eq!(m.tree().parent(z), Some(m.root_group()));
        assert_eq!(m.tree().name(g), name);
        assert_eq!(m.tree().group(g).unwrap().color(), color);
    }

    #[test]
    fn protected_group_stays_attached_while_empty() {
        let mut m = manual_manager();
        m.handle_event(TaskEvent::TaskAdded(WindowId(1), info_on("a", 1)));
        m.handle_event(TaskEvent::TaskAdded(WindowId(2), info_on("b", 1)));
        let x = m.item_for_window(WindowId(1)).unwrap();
        let y = m.item_for_window(WindowId(2)).unwrap();
        m.manual_grouping_request_list(&[x, y]);
        let g = m.tree().parent(x).unwrap();

        m.handle_event(TaskEvent::DesktopChanged(2));
        assert!(m.tree().contains(g));
        assert!(m.tree().group(g).unwrap().is_empty());
        assert_eq!(m.tree().parent(g), Some(m.root_group()));
    }

    #[test]
    fn member_request_respects_editable_properties() {
        let mut m = manual_manager();
        m.handle_event(TaskEvent::TaskAdded(WindowId(1), info_on("a", 1)));
        m.handle_event(TaskEvent::TaskAdded(WindowId(2), info_on("b", 1)));
        m.handle_event(TaskEvent::TaskAdded(WindowId(3), info_on("c", 1)));
        let x = m.item_for_window(WindowId(1)).unwrap();
        let y = m.item_for_window(WindowId(2)).unwrap();
        let z = m.item_for_window(WindowId(3)).unwrap();
        m.manual_grouping_request_list(&[x, y]);
        let g = m.tree().parent(x).unwrap();
        assert!(m.manual_grouping_request(z, g));
        assert_eq!(m.tree().members(g), &[x, y, z]);

        m.set_grouping_policy(GroupingPolicy::ProgramGrouping);
        let z = m.item_for_window(WindowId(3)).unwrap();
        let root = m.root_group();
        assert!(!m.manual_grouping_request(z, root));
    }

    #[test]
    fn renaming_respects_uniqueness() {
        let mut m = manual_manager();
        m.handle_event(TaskEvent::TaskAdded(WindowId(1), info_on("a", 1)));
        m.handle_event(TaskEvent::TaskAdded(WindowId(2), info_on("b", 1)));
        m.handle_event(TaskEvent::TaskAdded(WindowId(3), info_on("c", 1)));
        m.handle_event(TaskEvent::TaskAdded(WindowId(4), info_on("d", 1)));
        let a = m.item_for_window(WindowId(1)).unwrap();
        let b = m.item_for_window(WindowId(2)).unwrap();
        let c = m.item_for_window(WindowId(3)).unwrap();
        let d = m.item_for_window(WindowId(4)).unwrap();
        m.manual_grouping_request_list(&[a, b]);
        m.manual_grouping_request_list(&[c, d]);
        let g1 = m.tree().parent(a).unwrap();
        let g2 = m.tree().parent(c).unwrap();
        assert_ne!(m.tree().name(g1), m.tree().name(g2));

        assert!(m.set_group_name(g1, "work".to_owned()));
        assert!(!m.set_group_name(g2, "work".to_owned()));
        assert!(!m.name_suggestions().contains(&m.tree().name(g2).to_owned()));
    }
}

mod sorting_scenarios {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn alpha_order_is_stable_for_same_program() {
        let mut m = manager(GroupManagerSettings {
            sorting_strategy: SortingPolicy::AlphaSorting,
            ..GroupManagerSettings::default()
        });
        m.handle_event(TaskEvent::TaskAdded(WindowId(1), info("editor")));
        m.handle_event(TaskEvent::TaskAdded(WindowId(2), info("alacritty")));
        m.handle_event(TaskEvent::TaskAdded(WindowId(3), info("editor")));
        let ids: Vec<WindowId> = m
            .tree()
            .members(m.root_group())
            .iter()
            .map(|i| m.tree().task(*i).unwrap().window_id().unwrap())
            .collect();
        assert_eq!(ids, vec![WindowId(2), WindowId(1), WindowId(3)]);
    }

    #[test]
    fn manual_positions_survive_desktop_round_trip() {
        let mut m = manager(GroupManagerSettings {
            sorting_strategy: SortingPolicy::ManualSorting,
            show_only_current_desktop: true,
            ..GroupManagerSettings::default()
        });
        m.handle_event(TaskEvent::TaskAdded(WindowId(1), info_on("a", 1)));
        m.handle_event(TaskEvent::TaskAdded(WindowId(2), info_on("b", 1)));
        m.handle_event(TaskEvent::TaskAdded(WindowId(3), info_on("c", 1)));
        let c = m.item_for_window(WindowId(3)).unwrap();
        assert!(m.manual_sorting_request(c, 0));
        let pinned: Vec<ItemId> = m.tree().members(m.root_group()).to_vec();

        m.handle_event(TaskEvent::DesktopChanged(2));
        m.handle_event(TaskEvent::DesktopChanged(1));
        assert_eq!(m.tree().members(m.root_group()), pinned.as_slice());
    }

    #[test]
    fn sorting_requests_are_gated_on_the_strategy() {
        let mut m = manager(GroupManagerSettings::default());
        m.handle_event(TaskEvent::TaskAdded(WindowId(1), info("a")));
        let item = m.item_for_window(WindowId(1)).unwrap();
        assert!(!m.manual_sorting_request(item, 0));
    }
}

mod startup_scenarios {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn placeholder_groups_with_its_program_once_resolved() {
        let mut m = manager(GroupManagerSettings {
            grouping_strategy: GroupingPolicy::ProgramGrouping,
            ..GroupManagerSettings::default()
        });
        m.handle_event(TaskEvent::TaskAdded(WindowId(1), info("editor")));
        m.handle_event(TaskEvent::StartupAdded(StartupId(1), StartupInfo {
            title: "Editor".to_owned(),
            icon: Default::default(),
            desktop: 1,
        }));
        // The placeholder has no program identity yet, so it sits at root.
        assert!(groups_at_root(&m).is_empty());

        let mut resolved = info("editor");
        resolved.startup = Some(StartupId(1));
        m.handle_event(TaskEvent::TaskAdded(WindowId(2), resolved));
        m.handle_event(TaskEvent::TaskChanged(
            WindowId(2),
            TaskChanges::STATE,
            info("editor"),
        ));
        let groups = groups_at_root(&m);
        assert_eq!(groups.len(), 1);
        assert_eq!(m.tree().members(groups[0]).len(), 2);
    }
}

mod attention_scenarios {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn attention_window_surfaces_until_it_calms_down() {
        let mut m = manager(GroupManagerSettings {
            grouping_strategy: GroupingPolicy::ProgramGrouping,
            show_only_current_desktop: true,
            ..GroupManagerSettings::default()
        });
        m.handle_event(TaskEvent::TaskAdded(WindowId(1), info_on("editor", 1)));
        m.handle_event(TaskEvent::TaskAdded(WindowId(2), info_on("editor", 1)));

        let mut urgent = info_on("editor", 3);
        urgent.state = WindowState::DEMANDS_ATTENTION;
        m.handle_event(TaskEvent::TaskAdded(WindowId(3), urgent));
        let item = m.item_for_window(WindowId(3)).unwrap();
        assert_eq!(m.tree().parent(item), Some(m.root_group()));

        // Attention cleared: the ordinary filters apply again and desktop 3
        // is not ours.
        m.handle_event(TaskEvent::TaskChanged(
            WindowId(3),
            TaskChanges::STATE,
            info_on("editor", 3),
        ));
        assert_eq!(m.tree().parent(item), None);
    }
}
