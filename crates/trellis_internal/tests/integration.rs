//! End-to-end: kernel, plugins, declarations and locators together.

use std::sync::Arc;

use serde_json::{Value, json};
use trellis_internal::prelude::*;

// ─────────────────────────────────────────────────────────────────────────────
// Application units
// ─────────────────────────────────────────────────────────────────────────────

trait Command: Send + Sync {
    fn describe(&self) -> String;
}

#[derive(Debug)]
struct Settings {
    greeting: String,
}

#[derive(Debug)]
struct Greet {
    settings: Arc<Settings>,
}

struct Shout {
    greet: Arc<Greet>,
}

impl Command for Greet {
    fn describe(&self) -> String {
        self.settings.greeting.clone()
    }
}

impl Command for Shout {
    fn describe(&self) -> String {
        self.greet.describe().to_uppercase()
    }
}

impl Injectable for Greet {
    fn construct(args: Args) -> Result<Self, ContainerError> {
        Ok(Self {
            settings: args.get(0)?,
        })
    }

    fn arity() -> Option<usize> {
        Some(1)
    }

    fn capabilities() -> Vec<Capability> {
        vec![Capability::new::<Self, dyn Command>(|greet| greet)]
    }
}

impl Injectable for Shout {
    fn construct(args: Args) -> Result<Self, ContainerError> {
        Ok(Self {
            greet: args.get(0)?,
        })
    }

    fn capabilities() -> Vec<Capability> {
        vec![Capability::new::<Self, dyn Command>(|shout| shout)]
    }
}

struct CommandPlugin;

impl Plugin for CommandPlugin {
    fn namespace(&self) -> &str {
        "commands"
    }

    fn default_config(&self) -> Value {
        json!({ "greeting": "hello" })
    }

    fn register_services(&self, injector: &Injector, config: &Value) -> Result<(), KernelError> {
        let greeting = config["greeting"]
            .as_str()
            .ok_or_else(|| KernelError::plugin("commands", "`greeting` must be a string"))?;
        injector.container().register_value(
            "settings",
            Settings {
                greeting: greeting.to_string(),
            },
            TagSet::new(),
        );

        injector.add_auto_tagging(CapabilityTagging::new::<dyn Command>("command"));
        injector.register(
            Declaration::<Greet>::depends_on(["settings"])
                .named("cmd.greet")
                .with_alias("greet"),
        )?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn booted_application_resolves_through_every_layer() {
    let mut kernel = init(KernelOptions::new().with_env("test"));
    kernel
        .add_plugin(CommandPlugin, AddPluginOptions::new())
        .unwrap();
    kernel.add_loader(|injector: Injector| async move {
        injector.inject::<Shout>(0, "cmd.greet")?;
        injector.register(Declaration::<Shout>::injected().named("cmd.shout"))?;
        Ok(())
    });

    kernel
        .boot(&json!({ "commands": { "greeting": "hi there" } }))
        .unwrap();
    kernel.ready().await.unwrap();

    let greet = kernel
        .container()
        .resolve_by_alias::<Greet>("greet")
        .await
        .unwrap();
    assert_eq!(greet.describe(), "hi there");

    let locator = TaggedServiceLocator::new("command");
    locator.bind(kernel.container().clone()).unwrap();
    let described: Vec<String> = locator
        .resolve_all_as::<dyn Command>()
        .await
        .unwrap()
        .iter()
        .map(|command| command.describe())
        .collect();
    assert_eq!(described, vec!["hi there", "HI THERE"]);

    let shout = kernel.container().resolve::<Shout>("cmd.shout").await.unwrap();
    assert!(Arc::ptr_eq(&shout.greet, &greet));
}

#[tokio::test]
async fn environment_decides_which_plugins_register() {
    let mut kernel = init(KernelOptions::new().with_env("production"));
    kernel
        .add_plugin(
            CommandPlugin,
            AddPluginOptions::new().with_envs(["development"]),
        )
        .unwrap();
    kernel.boot(&json!({})).unwrap();
    kernel.ready().await.unwrap();

    let err = kernel
        .container()
        .resolve::<Greet>("cmd.greet")
        .await
        .unwrap_err();
    assert!(matches!(err, ContainerError::UnknownService { .. }));
}

#[tokio::test]
async fn bad_plugin_configuration_aborts_boot() {
    let mut kernel = init(KernelOptions::new());
    kernel
        .add_plugin(CommandPlugin, AddPluginOptions::new())
        .unwrap();

    let err = kernel
        .boot(&json!({ "commands": { "greeting": 42 } }))
        .unwrap_err();
    assert!(matches!(err, KernelError::Plugin { .. }));
}
