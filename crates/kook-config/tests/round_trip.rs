//! Load/save round trips of YAML configurations.

use std::sync::Arc;

use indexmap::IndexMap;
use kook_config::{
    ConfigurationSection, ConfigurationSerializable, DeserializationError, SerializationRegistry, Value,
    YamlConfiguration,
};
use proptest::prelude::*;

fn lines(items: &[Option<&str>]) -> Vec<Option<String>> {
    items.iter().map(|l| l.map(str::to_string)).collect()
}

fn loaded(source: &str) -> YamlConfiguration {
    let mut config = YamlConfiguration::new();
    config
        .load_from_str(source)
        .unwrap_or_else(|e| panic!("{source:?} should load: {e}"));
    config
}

#[test]
fn test_header_is_split_at_last_blank_line() {
    let source = "# a\n\n# b\nfirst: 1\nsecond: 2\n";
    let config = loaded(source);

    assert_eq!(config.options().header, lines(&[Some("a")]));
    assert_eq!(config.comments("first"), lines(&[Some("b")]).as_slice());
    assert!(config.comments("second").is_empty());
    assert_eq!(config.save_to_string(), source);
}

#[test]
fn test_header_without_blank_line_belongs_to_first_key() {
    let source = "# about first\nfirst: 1\n";
    let config = loaded(source);
    assert!(config.options().header.is_empty());
    assert_eq!(config.comments("first"), lines(&[Some("about first")]).as_slice());
    assert_eq!(config.save_to_string(), source);
}

#[test]
fn test_empty_and_filler_input() {
    for source in ["", "\u{0000}"] {
        let config = loaded(source);
        assert!(config.is_empty());
        assert!(config.options().header.is_empty());
        assert!(config.options().footer.is_empty());
    }
}

#[test]
fn test_top_level_sequence_is_rejected() {
    let error = YamlConfiguration::new().load_from_str("- a\n- b\n").unwrap_err();
    assert_eq!(error.message, "top level is not a mapping");
    assert_eq!(error.line, Some(1));
}

#[test]
fn test_defaults_fallback() {
    let defaults = loaded("x: 5\n");
    let mut config = loaded("");
    config.set_defaults(defaults.root().clone());

    assert_eq!(config.get_i64("x"), Some(5));
    config.set("x", 7);
    assert_eq!(config.get_i64("x"), Some(7));
    assert_eq!(defaults.get_i64("x"), Some(5));
    assert_eq!(config.save_to_string(), "x: 7\n");
}

#[test]
fn test_hand_edited_forms_load() {
    let config = loaded("\
motd: welcome to
  the server
indented: |2
   two spaces kept
? explicit
: key
");
    assert_eq!(config.get_string("motd"), Some("welcome to the server"));
    assert_eq!(config.get_string("indented"), Some(" two spaces kept\n"));
    assert_eq!(config.get_string("explicit"), Some("key"));
    assert_eq!(
        config.save_to_string(),
        "motd: welcome to the server\nindented: \" two spaces kept\\n\"\nexplicit: key\n"
    );
}

#[derive(Debug)]
struct Location {
    world: String,
    x: i64,
}

impl ConfigurationSerializable for Location {
    fn serialize(&self) -> IndexMap<String, Value> {
        IndexMap::from([
            ("world".to_string(), Value::from(self.world.as_str())),
            ("x".to_string(), Value::Int(self.x)),
        ])
    }
}

fn registry() -> Arc<SerializationRegistry> {
    let mut registry = SerializationRegistry::new();
    registry.register("Location", |fields| {
        let world = fields
            .get("world")
            .and_then(Value::as_str)
            .ok_or_else(|| DeserializationError::invalid("Location", "missing world"))?;
        let x = fields.get("x").and_then(Value::as_i64).unwrap_or_default();
        Ok(Arc::new(Location { world: world.to_string(), x }) as Arc<dyn ConfigurationSerializable>)
    });
    Arc::new(registry)
}

#[test]
fn test_typed_objects_are_not_sections() {
    let source = "\
spawn:
  ==: Location
  world: main
  x: 3
unknown:
  ==: Warp
  target:
    world: nether
deep:
  a:
    b:
      world: main
";
    let mut config = YamlConfiguration::new().with_registry(registry());
    config.load_from_str(source).unwrap();

    let spawn = config.get_object("spawn").unwrap();
    let location = spawn.downcast_ref::<Location>().unwrap();
    assert_eq!((location.world.as_str(), location.x), ("main", 3));
    assert!(config.section("spawn").is_none());

    let unknown = config.get_object("unknown").unwrap();
    assert!(!unknown.is_resolved());
    assert!(config.get("unknown.target").is_none());

    assert_eq!(config.get_string("deep.a.b.world"), Some("main"));
    assert_eq!(config.save_to_string(), source);
}

#[test]
fn test_saved_text_is_stable() {
    let mut config = YamlConfiguration::new();
    config.options_mut().header = lines(&[Some("Bot configuration"), Some("Edit with care")]);
    config.options_mut().footer = lines(&[None, Some("end of file")]);
    config.set("bot.name", "kook");
    config.set("bot.prefix", "!");
    config.set("bot.owners", vec!["alice", "bob"]);
    config.set("limits.messages", 10);
    config.set("limits.ratio", 0.75);
    config.set("limits.enabled", true);
    config.set("motd", "Welcome: have fun");
    config.set_comments("bot", lines(&[Some("Identity")]));
    config.set_inline_comments("bot.prefix", lines(&[Some("command prefix")]));
    config.set_comments("limits", lines(&[None, Some("Rate limits")]));
    config.set_inline_comments("limits", lines(&[Some("per minute")]));

    let saved = config.save_to_string();
    insta::assert_snapshot!(saved, @r"
    # Bot configuration
    # Edit with care

    # Identity
    bot:
      name: kook
      prefix: '!' # command prefix
      owners:
      - alice
      - bob

    # Rate limits
    limits: # per minute
      messages: 10
      ratio: 0.75
      enabled: true
    motd: 'Welcome: have fun'

    # end of file
    ");

    let reloaded = loaded(&saved);
    assert_eq!(reloaded.options().header, config.options().header);
    assert_eq!(reloaded.options().footer, config.options().footer);
    assert_eq!(reloaded.root(), config.root());
    assert_eq!(reloaded.save_to_string(), saved);
}

fn text() -> impl Strategy<Value = String> {
    "[ -~]{0,10}"
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        "[ -~]{0,12}".prop_map(Value::String),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => leaf(),
        1 => prop::collection::vec(leaf(), 0..4).prop_map(Value::Sequence),
        1 => prop::collection::vec(("[a-z]{1,5}", leaf()), 0..4).prop_map(|pairs| {
            let mut section = ConfigurationSection::new();
            for (key, value) in pairs {
                section.set(&key, value);
            }
            Value::Section(section)
        }),
    ]
}

fn configuration() -> impl Strategy<Value = YamlConfiguration> {
    let header = prop::option::of((text(), prop::collection::vec(prop::option::of(text()), 0..3)));
    let footer = prop::collection::vec(prop::option::of(text()), 0..3);
    let entry = (
        "[a-z]{1,6}",
        value(),
        prop::collection::vec(prop::option::of(text()), 0..3),
        prop::option::of(text()),
    );
    (header, footer, prop::collection::vec(entry, 0..6)).prop_map(|(header, footer, entries)| {
        let mut config = YamlConfiguration::new();
        for (key, value, comments, inline) in entries {
            config.set(&key, value);
            config.set_comments(&key, comments);
            config.set_inline_comments(&key, inline.into_iter().map(Some).collect());
        }
        // Blank lines above the first key are where the header ends.
        if let Some(first) = config.keys(false).first() {
            let comments = config.comments(first).iter().flatten().cloned().map(Some).collect();
            config.set_comments(first, comments);
        }
        let mut options = config.options_mut();
        options.header = header
            .map(|(first, rest)| std::iter::once(Some(first)).chain(rest).collect())
            .unwrap_or_default();
        options.footer = footer;
        drop(options);
        config
    })
}

proptest! {
    #[test]
    fn saved_text_reloads_to_the_same_configuration(config in configuration()) {
        let saved = config.save_to_string();
        let mut reloaded = YamlConfiguration::new();
        reloaded.load_from_str(&saved).map_err(|e| TestCaseError::fail(format!("{e}\n{saved}")))?;

        prop_assert_eq!(reloaded.root(), config.root(), "{}", saved);
        prop_assert_eq!(&reloaded.options().header, &config.options().header, "{}", saved);
        prop_assert_eq!(&reloaded.options().footer, &config.options().footer, "{}", saved);
        prop_assert_eq!(reloaded.save_to_string(), saved);
    }
}
