//! Sandbox unit tests
//!
//! Covers scope resolution order, write classification, effect tracking
//! and release, data channels, and UMD snapshot/restore fidelity.

#[cfg(test)]
mod scope_tests {
    use crate::scope::{RealScope, ResolveOutcome, ScopeStore, WriteOutcome};
    use crate::value::{FunctionValue, Property, ThisBinding, Value};

    #[test]
    fn test_resolution_precedence() {
        let mut real = RealScope::new();
        real.set("shared", Value::Number(1.0));

        let mut store = ScopeStore::new();
        assert_eq!(store.resolve(&real, "window"), ResolveOutcome::Facade);
        assert_eq!(
            store.resolve(&real, "shared"),
            ResolveOutcome::Fallback(Value::Number(1.0))
        );
        assert_eq!(store.resolve(&real, "missing"), ResolveOutcome::Missing);

        store.assign(&mut real, "shared", Value::Number(2.0), true);
        assert!(matches!(store.resolve(&real, "shared"), ResolveOutcome::Local(_)));
    }

    #[test]
    fn test_scope_only_keys_never_fall_back() {
        let mut real = RealScope::new();
        real.set("__ATRIUM_SECRET__", Value::Number(9.0));
        real.set("pluginScoped", Value::Number(9.0));

        let mut store = ScopeStore::new();
        store.declare_scoped(&["pluginScoped"]);

        assert_eq!(store.resolve(&real, "__ATRIUM_SECRET__"), ResolveOutcome::Missing);
        assert_eq!(store.resolve(&real, "pluginScoped"), ResolveOutcome::Missing);
        assert!(!store.has(&real, "pluginScoped"));
        assert!(store.has(&real, "__noprefix"));
    }

    #[test]
    fn test_fallback_functions_are_rebound() {
        let mut real = RealScope::new();
        real.set("fetch", Value::Function(FunctionValue::plain(1)));
        real.set("Worker", Value::Function(FunctionValue::constructor(2)));
        real.set(
            "bound",
            Value::Function(FunctionValue::bound(3, ThisBinding::RealScope)),
        );

        let store = ScopeStore::new();
        match store.resolve(&real, "fetch") {
            ResolveOutcome::Fallback(Value::Function(f)) => {
                assert_eq!(f.this_binding, ThisBinding::RealScope);
                assert_eq!(f.id, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        // Constructors and already-bound functions come back unmodified.
        match store.resolve(&real, "Worker") {
            ResolveOutcome::Fallback(Value::Function(f)) => {
                assert_eq!(f.this_binding, ThisBinding::Unbound);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        match store.resolve(&real, "bound") {
            ResolveOutcome::Fallback(Value::Function(f)) => {
                assert_eq!(f.this_binding, ThisBinding::RealScope);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_write_classification() {
        let mut real = RealScope::new();
        real.set("shadowme", Value::Number(1.0));
        real.define("frozen", Property::readonly(Value::Number(2.0)));

        let mut store = ScopeStore::new();
        // Inactive writes are dropped.
        assert_eq!(
            store.assign(&mut real, "x", Value::Number(0.0), false),
            WriteOutcome::Dropped
        );
        assert_eq!(store.get_local("x"), None);

        // Write-through list.
        assert_eq!(
            store.assign(&mut real, "location", Value::string("https://y/"), true),
            WriteOutcome::WroteThrough
        );
        assert_eq!(real.get("location"), Some(&Value::string("https://y/")));

        // Writable real-scope key is shadowed, descriptor preserved.
        assert_eq!(
            store.assign(&mut real, "shadowme", Value::Number(5.0), true),
            WriteOutcome::Shadowed
        );
        assert_eq!(real.get("shadowme"), Some(&Value::Number(1.0)));
        assert_eq!(store.get_local("shadowme"), Some(&Value::Number(5.0)));

        // Read-only real-scope key is plain-injected instead.
        assert_eq!(
            store.assign(&mut real, "frozen", Value::Number(3.0), true),
            WriteOutcome::Injected { escaped: false }
        );
        assert_eq!(real.get("frozen"), Some(&Value::Number(2.0)));

        // Brand-new key is injected.
        assert_eq!(
            store.assign(&mut real, "appGlobal", Value::Number(7.0), true),
            WriteOutcome::Injected { escaped: false }
        );
        assert_eq!(store.injected_keys(), ["appGlobal", "frozen"]);
    }

    #[test]
    fn test_escaping_keys_mirror_to_real_scope() {
        let mut real = RealScope::new();
        let mut store = ScopeStore::new();
        store.declare_escaping(&["sharedState"]);

        assert_eq!(
            store.assign(&mut real, "sharedState", Value::Number(1.0), true),
            WriteOutcome::Injected { escaped: true }
        );
        assert_eq!(real.get("sharedState"), Some(&Value::Number(1.0)));

        // Cross-bundler globals escape when absent from the real scope.
        assert_eq!(
            store.assign(&mut real, "System", Value::Number(2.0), true),
            WriteOutcome::Injected { escaped: true }
        );
        assert_eq!(store.escaped_keys(), ["System", "sharedState"]);
    }

    #[test]
    fn test_delete_clears_both_sides() {
        let mut real = RealScope::new();
        let mut store = ScopeStore::new();
        store.declare_escaping(&["esc"]);
        store.assign(&mut real, "esc", Value::Number(1.0), true);

        assert!(store.delete(&mut real, "esc"));
        assert_eq!(store.get_local("esc"), None);
        assert!(!real.has("esc"));
        assert!(store.injected_keys().is_empty());
        assert!(store.escaped_keys().is_empty());
    }

    #[test]
    fn test_clear_removes_injected_and_escaped() {
        let mut real = RealScope::new();
        real.set("shadowme", Value::Number(1.0));
        let mut store = ScopeStore::new();
        store.declare_escaping(&["esc"]);
        store.assign(&mut real, "inj", Value::Number(1.0), true);
        store.assign(&mut real, "esc", Value::Number(2.0), true);
        store.assign(&mut real, "shadowme", Value::Number(3.0), true);

        store.clear(&mut real);
        store.clear(&mut real); // idempotent

        assert_eq!(store.get_local("inj"), None);
        assert_eq!(store.get_local("shadowme"), None);
        assert!(!real.has("esc"));
        assert_eq!(real.get("shadowme"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_isolation_between_stores() {
        let mut real = RealScope::new();
        let mut a = ScopeStore::new();
        let b = ScopeStore::new();

        a.assign(&mut real, "appKey", Value::Number(42.0), true);
        assert!(matches!(a.resolve(&real, "appKey"), ResolveOutcome::Local(_)));
        assert_eq!(b.resolve(&real, "appKey"), ResolveOutcome::Missing);
    }
}

#[cfg(test)]
mod effects_tests {
    use alloc::rc::Rc;
    use core::cell::Cell;

    use crate::effects::{EffectTracker, EventBus, TimerHost};

    #[test]
    fn test_listeners_forward_and_release() {
        let mut bus = EventBus::new();
        let mut tracker = EffectTracker::new("app1");
        let fired = Rc::new(Cell::new(0));

        let fired2 = fired.clone();
        tracker.add_listener(&mut bus, "scroll", Rc::new(move || fired2.set(fired2.get() + 1)));
        assert_eq!(bus.dispatch("scroll"), 1);
        assert_eq!(fired.get(), 1);

        let mut timers = TimerHost::new();
        tracker.release_effects(&mut bus, &mut timers);
        assert_eq!(bus.dispatch("scroll"), 0);
        assert_eq!(tracker.listener_count(), 0);

        // Releasing twice is a no-op.
        tracker.release_effects(&mut bus, &mut timers);
        assert_eq!(bus.total(), 0);
    }

    #[test]
    fn test_unmount_event_is_qualified_per_app() {
        let mut bus = EventBus::new();
        let mut tracker_a = EffectTracker::new("app-a");
        let mut tracker_b = EffectTracker::new("app-b");

        tracker_a.add_listener(&mut bus, "unmount", Rc::new(|| {}));
        tracker_b.add_listener(&mut bus, "unmount", Rc::new(|| {}));

        assert_eq!(bus.count("unmount"), 0);
        assert_eq!(bus.count("unmount-app-a"), 1);
        assert_eq!(bus.count("unmount-app-b"), 1);
    }

    #[test]
    fn test_timers_forward_and_release() {
        let mut timers = TimerHost::new();
        let mut bus = EventBus::new();
        let mut tracker = EffectTracker::new("app1");

        let id = tracker.set_timer(&mut timers, 100, Rc::new(|| {}));
        assert_eq!(timers.pending(), 1);
        tracker.clear_timer(&mut timers, id);
        assert_eq!(timers.pending(), 0);

        tracker.set_timer(&mut timers, 50, Rc::new(|| {}));
        tracker.set_timer(&mut timers, 60, Rc::new(|| {}));
        tracker.release_effects(&mut bus, &mut timers);
        assert_eq!(timers.pending(), 0);
        assert_eq!(tracker.timer_count(), 0);
    }
}

#[cfg(test)]
mod channel_tests {
    use alloc::rc::Rc;
    use core::cell::Cell;

    use crate::channel::DataChannel;
    use crate::value::Value;

    #[test]
    fn test_dispatch_and_get_data() {
        let mut channel = DataChannel::new();
        let seen = Rc::new(Cell::new(0.0));
        let seen2 = seen.clone();
        channel.add_listener(
            Rc::new(move |data| {
                if let Value::Number(n) = data {
                    seen2.set(*n);
                }
            }),
            false,
        );
        channel.dispatch(Value::Number(7.0));
        assert_eq!(seen.get(), 7.0);
        assert_eq!(channel.get_data(), Some(&Value::Number(7.0)));
    }

    #[test]
    fn test_auto_trigger_fires_for_late_subscriber() {
        let mut channel = DataChannel::new();
        channel.dispatch(Value::Number(3.0));

        let seen = Rc::new(Cell::new(0.0));
        let seen2 = seen.clone();
        channel.add_listener(
            Rc::new(move |data| {
                if let Value::Number(n) = data {
                    seen2.set(*n);
                }
            }),
            true,
        );
        assert_eq!(seen.get(), 3.0);
    }

    #[test]
    fn test_remove_listener() {
        let mut channel = DataChannel::new();
        let id = channel.add_listener(Rc::new(|_| {}), false);
        assert_eq!(channel.listener_count(), 1);
        channel.remove_listener(id);
        assert_eq!(channel.listener_count(), 0);
    }
}

#[cfg(test)]
mod sandbox_tests {
    use alloc::rc::Rc;

    use atrium_dom::patch::PatchContext;
    use atrium_types::url::Url;

    use crate::effects::{EventBus, TimerHost};
    use crate::sandbox::{Sandbox, MARKER_NAME, MARKER_PUBLIC_PATH};
    use crate::scope::{RealScope, ResolveOutcome, WriteOutcome};
    use crate::value::Value;

    fn url() -> Url {
        Url::parse("https://x/common/index.html").unwrap()
    }

    #[test]
    fn test_identity_markers_are_seeded() {
        let sandbox = Sandbox::new("app1", &url());
        assert_eq!(sandbox.get_local(MARKER_NAME), Some(&Value::string("app1")));
        assert_eq!(
            sandbox.get_local(MARKER_PUBLIC_PATH),
            Some(&Value::string("https://x/common/"))
        );
        assert_eq!(sandbox.get_local("rawWindow"), Some(&Value::RealScopeRef));
        assert_eq!(sandbox.get_local("rawDocument"), Some(&Value::RealDocumentRef));
    }

    #[test]
    fn test_start_is_idempotent_and_refcounts_patch() {
        let mut ctx = PatchContext::new();
        let mut sandbox = Sandbox::new("app1", &url());
        sandbox.start(Some("/app1"), &mut ctx);
        sandbox.start(Some("/app1"), &mut ctx);
        assert!(sandbox.is_active());
        assert!(ctx.is_installed());

        let mut real = RealScope::new();
        let mut bus = EventBus::new();
        let mut timers = TimerHost::new();
        sandbox.stop(&mut ctx, &mut real, &mut bus, &mut timers);
        assert!(!ctx.is_installed());
    }

    #[test]
    fn test_stop_twice_matches_stop_once() {
        let mut ctx = PatchContext::new();
        let mut real = RealScope::new();
        let mut bus = EventBus::new();
        let mut timers = TimerHost::new();

        let mut sandbox = Sandbox::new("app1", &url());
        sandbox.start(None, &mut ctx);
        sandbox.assign(&mut real, "k", Value::Number(1.0));
        sandbox.add_listener(&mut bus, "scroll", Rc::new(|| {}));
        sandbox.set_timer(&mut timers, 10, Rc::new(|| {}));

        sandbox.stop(&mut ctx, &mut real, &mut bus, &mut timers);
        let keys_once = sandbox.own_keys();
        let total_once = bus.total();

        sandbox.stop(&mut ctx, &mut real, &mut bus, &mut timers);
        assert_eq!(sandbox.own_keys(), keys_once);
        assert_eq!(bus.total(), total_once);
        assert_eq!(timers.pending(), 0);
        assert!(!ctx.is_installed());
    }

    #[test]
    fn test_effects_gated_by_active_flag() {
        let mut bus = EventBus::new();
        let mut timers = TimerHost::new();
        let mut sandbox = Sandbox::new("app1", &url());

        assert!(sandbox.add_listener(&mut bus, "scroll", Rc::new(|| {})).is_none());
        assert!(sandbox.set_timer(&mut timers, 5, Rc::new(|| {})).is_none());
        assert_eq!(bus.total(), 0);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn test_isolation_between_sandboxes() {
        let mut ctx = PatchContext::new();
        let mut real = RealScope::new();
        let mut a = Sandbox::new("a", &url());
        let b = Sandbox::new("b", &url());
        a.start(None, &mut ctx);

        a.assign(&mut real, "secret", Value::Number(1.0));
        assert!(matches!(a.resolve(&real, "secret"), ResolveOutcome::Local(_)));
        assert_eq!(b.resolve(&real, "secret"), ResolveOutcome::Missing);
    }

    #[test]
    fn test_snapshot_rebuild_fidelity() {
        let mut ctx = PatchContext::new();
        let mut real = RealScope::new();
        let mut bus = EventBus::new();
        let mut timers = TimerHost::new();

        let mut sandbox = Sandbox::new("app1", &url());
        sandbox.start(None, &mut ctx);

        // Simulated top-level bundle execution.
        sandbox.assign(&mut real, "umdState", Value::Number(5.0));
        sandbox.add_listener(&mut bus, "unmount", Rc::new(|| {}));
        sandbox.add_listener(&mut bus, "scroll", Rc::new(|| {}));
        sandbox.set_timer(&mut timers, 30, Rc::new(|| {}));
        sandbox.host_channel.add_listener(Rc::new(|_| {}), false);

        sandbox.record_snapshot();
        sandbox.stop(&mut ctx, &mut real, &mut bus, &mut timers);
        assert_eq!(bus.total(), 0);
        assert_eq!(sandbox.get_local("umdState"), None);

        // Re-mount: rebuild instead of re-running the bundle.
        sandbox.start(None, &mut ctx);
        sandbox.rebuild_snapshot(&mut real, &mut bus, &mut timers);

        assert_eq!(sandbox.get_local("umdState"), Some(&Value::Number(5.0)));
        assert_eq!(bus.count("unmount-app1"), 1);
        assert_eq!(bus.count("scroll"), 1);
        assert_eq!(timers.pending(), 1);
        assert_eq!(sandbox.host_channel.listener_count(), 1);
        // The snapshot survives for the next cycle.
        assert!(sandbox.has_snapshot());

        sandbox.stop(&mut ctx, &mut real, &mut bus, &mut timers);
        sandbox.start(None, &mut ctx);
        sandbox.rebuild_snapshot(&mut real, &mut bus, &mut timers);
        assert_eq!(bus.count("scroll"), 1);
        assert_eq!(timers.pending(), 1);
    }

    #[test]
    fn test_assign_respects_write_outcomes() {
        let mut real = RealScope::new();
        let mut sandbox = Sandbox::new("app1", &url());
        // Inactive: dropped.
        assert_eq!(
            sandbox.assign(&mut real, "x", Value::Number(1.0)),
            WriteOutcome::Dropped
        );
    }
}
