//! Built-in command handlers
//!
//! Every handler is registered with an explicit dispatch classification.
//! Handlers never panic on bad input; they return a JSON outcome with an
//! `error` key, which the pipeline treats as a failed speculative run.
//!
//! `entity_to_json` is the one place entity records are shaped for the
//! wire, so get/list commands stay consistent.

use serde_json::{json, Value};

use safehold_core::{Entity, World};

use crate::registry::{CommandRegistry, CommandSpec, Dispatch};

/// Build the registry of all built-in commands
pub fn builtin_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    // Read-only commands
    registry.register(
        "ping",
        CommandSpec::new(Dispatch::Direct, Box::new(|_, _| json!({"pong": true}))),
    );
    registry.register(
        "get_all_entities",
        CommandSpec::new(
            Dispatch::Direct,
            Box::new(|world, _| {
                let entities: Vec<Value> = world.entities().map(entity_to_json).collect();
                json!({"entity_count": world.entity_count(), "entities": entities})
            }),
        ),
    );
    registry.register(
        "get_entity",
        CommandSpec::new(
            Dispatch::Direct,
            Box::new(|world, args| {
                let label = match arg_str(args, "label") {
                    Ok(label) => label,
                    Err(e) => return e,
                };
                match world.get(&label) {
                    Ok(entity) => entity_to_json(entity),
                    Err(_) => handler_error(format!("Entity not found: {}", label)),
                }
            }),
        ),
    );

    // Mutating commands under the full pipeline
    registry.register(
        "spawn_entity",
        CommandSpec::new(
            Dispatch::Guarded { expected_delta: 1 },
            Box::new(|world, args| {
                let label = match arg_str(args, "label") {
                    Ok(label) => label,
                    Err(e) => return e,
                };
                let kind = args
                    .get("kind")
                    .and_then(Value::as_str)
                    .unwrap_or("StaticProp")
                    .to_string();
                let path = args
                    .get("path")
                    .and_then(Value::as_str)
                    .unwrap_or("/props/default")
                    .to_string();
                let position = arg_vec3(args, "position").unwrap_or([0.0, 0.0, 0.0]);
                let orientation = arg_vec3(args, "orientation").unwrap_or([0.0, 0.0, 0.0]);

                let entity = Entity::new(label.as_str(), kind, path)
                    .at(position)
                    .oriented(orientation);
                match world.spawn(entity) {
                    Ok(()) => json!({"spawned": label}),
                    Err(e) => handler_error(e.to_string()),
                }
            }),
        ),
    );
    registry.register(
        "delete_entity",
        CommandSpec::new(
            Dispatch::Guarded { expected_delta: -1 },
            Box::new(|world, args| {
                let label = match arg_str(args, "label") {
                    Ok(label) => label,
                    Err(e) => return e,
                };
                match world.remove(&label) {
                    Ok(_) => json!({"deleted": label}),
                    Err(e) => handler_error(e.to_string()),
                }
            }),
        ),
    );
    registry.register(
        "set_entity_transform",
        CommandSpec::new(
            Dispatch::Guarded { expected_delta: 0 },
            Box::new(|world, args| {
                let label = match arg_str(args, "label") {
                    Ok(label) => label,
                    Err(e) => return e,
                };
                let entity = match world.get_mut(&label) {
                    Ok(entity) => entity,
                    Err(e) => return handler_error(e.to_string()),
                };
                if let Some(position) = arg_vec3(args, "position") {
                    entity.position = position;
                }
                if let Some(orientation) = arg_vec3(args, "orientation") {
                    entity.orientation = orientation;
                }
                entity_to_json(entity)
            }),
        ),
    );
    registry.register(
        "rename_entity",
        CommandSpec::new(
            Dispatch::Guarded { expected_delta: 0 },
            Box::new(|world, args| {
                let label = match arg_str(args, "label") {
                    Ok(label) => label,
                    Err(e) => return e,
                };
                let new_label = match arg_str(args, "new_label") {
                    Ok(new_label) => new_label,
                    Err(e) => return e,
                };
                match world.rename(&label, &new_label) {
                    Ok(()) => json!({"renamed": label, "to": new_label}),
                    Err(e) => handler_error(e.to_string()),
                }
            }),
        ),
    );

    // Registered bypasses. These mutate outside the pipeline; the router
    // logs every use.
    registry.register(
        "execute_script",
        CommandSpec::new(Dispatch::Bypass, Box::new(execute_script)),
    );
    registry.register(
        "write_protected",
        CommandSpec::new(
            Dispatch::Bypass,
            Box::new(|world, args| {
                let label = match arg_str(args, "label") {
                    Ok(label) => label,
                    Err(e) => return e,
                };
                let path = match arg_str(args, "path") {
                    Ok(path) => path,
                    Err(e) => return e,
                };
                match world.get_mut(&label) {
                    Ok(entity) => {
                        entity.path = path.clone();
                        json!({"label": label, "path": path})
                    }
                    Err(e) => handler_error(e.to_string()),
                }
            }),
        ),
    );

    registry
}

/// Script bypass: a batch of operations applied sequentially, no
/// transaction, no rollback of earlier operations on later failure
fn execute_script(world: &mut World, args: &Value) -> Value {
    let Some(operations) = args.get("operations").and_then(Value::as_array) else {
        return handler_error("Missing 'operations' array");
    };

    let mut applied = 0usize;
    for (index, op) in operations.iter().enumerate() {
        let result = apply_script_op(world, op);
        if let Some(message) = result {
            // Operations before the failure stay applied.
            return json!({
                "error": format!("Operation {} failed: {}", index, message),
                "applied": applied,
            });
        }
        applied += 1;
    }
    json!({"applied": applied})
}

fn apply_script_op(world: &mut World, op: &Value) -> Option<String> {
    let Some(action) = op.get("op").and_then(Value::as_str) else {
        return Some("Missing 'op' field".to_string());
    };
    let Some(label) = op.get("label").and_then(Value::as_str) else {
        return Some("Missing 'label' field".to_string());
    };
    match action {
        "spawn" => {
            let kind = op.get("kind").and_then(Value::as_str).unwrap_or("StaticProp");
            world
                .spawn(Entity::new(label, kind, "/props/default"))
                .err()
                .map(|e| e.to_string())
        }
        "delete" => world.remove(label).err().map(|e| e.to_string()),
        other => Some(format!("Unknown script op: {}", other)),
    }
}

/// Shape one entity record for the wire
pub fn entity_to_json(entity: &Entity) -> Value {
    json!({
        "label": entity.label,
        "kind": entity.kind,
        "path": entity.path,
        "position": entity.position,
        "orientation": entity.orientation,
    })
}

fn handler_error(message: impl Into<String>) -> Value {
    json!({"error": message.into()})
}

/// Required string argument; missing or non-string yields a handler error
fn arg_str(args: &Value, key: &str) -> std::result::Result<String, Value> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| handler_error(format!("Missing or invalid '{}' argument", key)))
}

/// Optional [x, y, z] argument
fn arg_vec3(args: &Value, key: &str) -> Option<[f64; 3]> {
    let arr = args.get(key)?.as_array()?;
    if arr.len() != 3 {
        return None;
    }
    Some([arr[0].as_f64()?, arr[1].as_f64()?, arr[2].as_f64()?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::is_error;

    fn invoke(registry: &CommandRegistry, world: &mut World, name: &str, args: Value) -> Value {
        registry.get(name).unwrap().invoke(world, &args)
    }

    #[test]
    fn test_spawn_and_get() {
        let registry = builtin_registry();
        let mut world = World::new();

        let outcome = invoke(
            &registry,
            &mut world,
            "spawn_entity",
            json!({"label": "Crate_01", "kind": "StaticProp", "position": [1.0, 2.0, 3.0]}),
        );
        assert!(!is_error(&outcome));
        assert_eq!(world.entity_count(), 1);

        let got = invoke(&registry, &mut world, "get_entity", json!({"label": "Crate_01"}));
        assert_eq!(got["kind"], "StaticProp");
        assert_eq!(got["position"], json!([1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_spawn_duplicate_reports_error() {
        let registry = builtin_registry();
        let mut world = World::new();
        invoke(&registry, &mut world, "spawn_entity", json!({"label": "X"}));
        let outcome = invoke(&registry, &mut world, "spawn_entity", json!({"label": "X"}));
        assert!(is_error(&outcome));
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn test_delete_missing_reports_error() {
        let registry = builtin_registry();
        let mut world = World::new();
        let outcome = invoke(&registry, &mut world, "delete_entity", json!({"label": "Ghost"}));
        assert!(is_error(&outcome));
    }

    #[test]
    fn test_set_transform_updates_in_place() {
        let registry = builtin_registry();
        let mut world = World::new();
        invoke(&registry, &mut world, "spawn_entity", json!({"label": "X"}));

        let outcome = invoke(
            &registry,
            &mut world,
            "set_entity_transform",
            json!({"label": "X", "position": [5.0, 0.0, 0.0], "orientation": [0.0, 90.0, 0.0]}),
        );
        assert!(!is_error(&outcome));
        let entity = world.get("X").unwrap();
        assert_eq!(entity.position, [5.0, 0.0, 0.0]);
        assert_eq!(entity.orientation, [0.0, 90.0, 0.0]);
    }

    #[test]
    fn test_missing_argument_is_handler_error() {
        let registry = builtin_registry();
        let mut world = World::new();
        let outcome = invoke(&registry, &mut world, "spawn_entity", json!({}));
        assert!(is_error(&outcome));
        assert!(outcome["error"].as_str().unwrap().contains("'label'"));
    }

    #[test]
    fn test_execute_script_partial_failure_keeps_earlier_ops() {
        let registry = builtin_registry();
        let mut world = World::new();

        let outcome = invoke(
            &registry,
            &mut world,
            "execute_script",
            json!({"operations": [
                {"op": "spawn", "label": "A"},
                {"op": "delete", "label": "Ghost"},
                {"op": "spawn", "label": "B"},
            ]}),
        );

        assert!(is_error(&outcome));
        assert_eq!(outcome["applied"], 1);
        // No transactional undo for scripts: A survives, B never ran
        assert!(world.contains("A"));
        assert!(!world.contains("B"));
    }

    #[test]
    fn test_write_protected_changes_path() {
        let registry = builtin_registry();
        let mut world = World::new();
        invoke(&registry, &mut world, "spawn_entity", json!({"label": "X"}));

        let outcome = invoke(
            &registry,
            &mut world,
            "write_protected",
            json!({"label": "X", "path": "/locked/new"}),
        );
        assert!(!is_error(&outcome));
        assert_eq!(world.get("X").unwrap().path, "/locked/new");
    }
}
