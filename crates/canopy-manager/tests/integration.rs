use canopy_core::ModuleRegistry;
use canopy_manager::{ConfigurationManager, ManagerOptions};
use canopy_test_utils::module_fixture;
use std::fs;

fn open(registry: ModuleRegistry) -> ConfigurationManager {
    ConfigurationManager::open(registry, ManagerOptions::default()).unwrap()
}

#[test]
fn test_end_to_end_add_directive_is_idempotent_across_runs() {
    let (_dir, module) = module_fixture("outer");
    fs::write(
        module.config_dir.join("configuration.xml"),
        "<configuration><a><b>1</b></a></configuration>",
    )
    .unwrap();
    fs::write(
        module.directives_dir.join("add.xml"),
        "<configuration><a><b>2</b></a></configuration>",
    )
    .unwrap();

    let check = |manager: &ConfigurationManager| {
        let blocks = manager.find_all("outer", "configuration", "a");
        assert_eq!(blocks.len(), 2, "expected exactly two 'a' blocks");
        let values: Vec<_> = manager
            .find_all("outer", "configuration", "a.b")
            .iter()
            .filter_map(|p| p.value().map(str::to_string))
            .collect();
        assert_eq!(values, vec!["1", "2"]);
    };

    // First run: the directive block is appended and persisted.
    let mut registry = ModuleRegistry::new();
    registry.register(module.clone());
    let manager = open(registry);
    check(&manager);
    assert!(module.persistence_dir.join("added.xml").exists());
    assert!(module.persistence_dir.join("configuration.xml").exists());

    // Second run over the same directories: no third block.
    let mut registry = ModuleRegistry::new();
    registry.register(module.clone());
    let manager = open(registry);
    check(&manager);
}

#[test]
fn test_post_merge_namespace_uniqueness() {
    let (_dir, module) = module_fixture("outer");
    fs::write(module.config_dir.join("configuration.xml"), "<configuration/>").unwrap();
    for sub in ["panels", "extras"] {
        fs::create_dir_all(module.config_dir.join(sub)).unwrap();
        fs::write(
            module.config_dir.join(sub).join("gui.xml"),
            format!("<gui><from>{sub}</from></gui>"),
        )
        .unwrap();
    }

    let mut registry = ModuleRegistry::new();
    registry.register(module);
    let manager = open(registry);

    // Two gui.xml files loaded, one root remains.
    let mut seen = std::collections::BTreeSet::new();
    for root in manager.roots_for_module("outer") {
        assert!(
            seen.insert(root.namespace().as_str().to_string()),
            "duplicate namespace {} after merge",
            root.namespace()
        );
    }
    let gui = manager.root("outer", "gui").unwrap();
    assert_eq!(gui.tree().children(gui.tree().root()).len(), 2);
    let froms: Vec<_> = manager
        .find_all("outer", "gui", "from")
        .iter()
        .filter_map(|p| p.value().map(str::to_string))
        .collect();
    assert_eq!(froms.len(), 2);
    assert!(froms.contains(&"panels".to_string()));
    assert!(froms.contains(&"extras".to_string()));
}

#[test]
fn test_locale_selection_end_to_end() {
    let (_dir, module) = module_fixture("outer");
    fs::write(
        module.config_dir.join("configuration.xml"),
        "<configuration><lang>default</lang></configuration>",
    )
    .unwrap();
    fs::write(
        module.config_dir.join("configuration_fr_FR.xml"),
        "<configuration><lang>fr</lang></configuration>",
    )
    .unwrap();

    let mut registry = ModuleRegistry::new();
    registry.register(module.clone());
    let manager = ConfigurationManager::open(
        registry,
        ManagerOptions {
            locale: Some("fr_FR".to_string()),
            ..ManagerOptions::default()
        },
    )
    .unwrap();
    assert_eq!(manager.value("outer", "configuration", "lang"), Some("fr"));

    // A locale with no exact match falls back to the suffixless file.
    let mut registry = ModuleRegistry::new();
    registry.register(module);
    let manager = ConfigurationManager::open(
        registry,
        ManagerOptions {
            locale: Some("de_DE".to_string()),
            ..ManagerOptions::default()
        },
    )
    .unwrap();
    assert_eq!(
        manager.value("outer", "configuration", "lang"),
        Some("default")
    );
}

#[test]
fn test_user_override_survives_reload() {
    let (_dir, module) = module_fixture("outer");
    fs::write(
        module.config_dir.join("configuration.xml"),
        "<configuration><depth>1</depth></configuration>",
    )
    .unwrap();

    // First run mutates and persists.
    let mut registry = ModuleRegistry::new();
    registry.register(module.clone());
    let mut manager = open(registry);
    manager
        .set_value("outer", "configuration", "depth", Some("9"))
        .unwrap();
    drop(manager);

    // Second run picks up the persisted override instead of the shipped
    // default.
    let mut registry = ModuleRegistry::new();
    registry.register(module);
    let manager = open(registry);
    assert_eq!(manager.value("outer", "configuration", "depth"), Some("9"));
}

#[test]
fn test_mutation_notifies_and_persists_deep_nodes() {
    let (_dir, module) = module_fixture("outer");
    fs::write(
        module.config_dir.join("configuration.xml"),
        "<configuration><ui><font><size>10</size></font></ui></configuration>",
    )
    .unwrap();

    let mut registry = ModuleRegistry::new();
    registry.register(module.clone());
    let mut manager = open(registry);

    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = std::sync::Arc::clone(&seen);
    manager.subscribe(move |notice: &canopy_manager::ChangeNotice| {
        sink.lock().unwrap().push(notice.path.clone());
    });

    manager
        .set_value("outer", "configuration", "ui.font.size", Some("12"))
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["configuration.ui.font.size".to_string()]
    );
    assert_eq!(
        manager.value("outer", "configuration", "ui.font.size"),
        Some("12")
    );
    assert!(module.persistence_dir.join("configuration.xml").exists());
}
