mod common;

use common::{html, mount, Captured, Counter, Journal};
use spark_fiber::{
    build, h, use_effect, use_state, Attributes, Child, ClassComponent, Cleanup, EffectError, Event, Kind, Phase,
    Props, RenderError, Rendered, RootConfig, SetState, UnitBudget, Updater, WorkStatus,
};

fn items(count: usize) -> spark_fiber::Element {
    let rows: Vec<_> = (0..count).map(|i| h("li", Attributes::new(), i)).collect();
    h("ul", Attributes::new(), rows)
}

// =============================================================================
// Time slicing
// =============================================================================

#[test]
fn test_sliced_render_yields_and_commits_atomically() {
    let (mut root, container) = mount(RootConfig::sliced());
    root.render(items(3), container).unwrap();
    assert_eq!(html(&root, container), "");
    assert!(root.has_pending_work());

    let status = root.work(&mut UnitBudget::new(2)).unwrap();
    assert_eq!(status, WorkStatus::Yielded);
    assert_eq!(root.phase(), Phase::Rendering);
    // Nothing is attached until the pass completes
    assert_eq!(html(&root, container), "");

    let mut slices = 1;
    while root.work(&mut UnitBudget::new(2)).unwrap() == WorkStatus::Yielded {
        slices += 1;
        assert_eq!(html(&root, container), "");
    }

    assert!(slices > 1);
    assert_eq!(root.phase(), Phase::Idle);
    assert_eq!(html(&root, container), "<ul><li>0</li><li>1</li><li>2</li></ul>");
    assert_eq!(root.stats().commits, 1);
    assert!(root.stats().yields >= slices);
}

#[test]
fn test_newer_request_restarts_in_flight_pass() {
    let (mut root, container) = mount(RootConfig::sliced());
    root.render(items(5), container).unwrap();
    assert_eq!(root.work(&mut UnitBudget::new(1)).unwrap(), WorkStatus::Yielded);

    root.render(items(1), container).unwrap();
    root.flush().unwrap();

    assert_eq!(root.stats().restarts, 1);
    assert_eq!(root.stats().commits, 1);
    assert_eq!(html(&root, container), "<ul><li>0</li></ul>");
}

#[test]
fn test_waker_fires_once_per_request() {
    let (mut root, container) = mount(RootConfig::sliced());
    let wakes = Counter::default();
    let counter = wakes.clone();
    root.set_waker(move || counter.hit());

    root.render(items(1), container).unwrap();
    root.request_render().unwrap();
    assert_eq!(wakes.get(), 1);

    root.work_slice().unwrap();
    root.flush().unwrap();
    root.request_render().unwrap();
    assert_eq!(wakes.get(), 2);
}

// =============================================================================
// Re-entrant updates
// =============================================================================

fn settle(target: i32) -> Child {
    build(
        Kind::component(move |props| {
            let target = props.int("target").unwrap_or_default() as i32;
            let (value, set_value) = use_state(|| 0)?;
            use_effect(
                move || {
                    if value < target {
                        set_value.set(value + 1);
                    }
                    Ok(None)
                },
                None,
            )?;
            Ok(Child::from(value))
        }),
        Attributes::new().with("target", target),
        (),
    )
}

#[test]
fn test_effect_updates_render_again_in_same_flush() {
    let (mut root, container) = mount(RootConfig::default());
    root.render(settle(3), container).unwrap();

    assert_eq!(html(&root, container), "3");
    assert_eq!(root.stats().commits, 4);
    assert!(!root.has_pending_work());
}

#[test]
fn test_runaway_effect_loop_is_bounded() {
    let (mut root, container) = mount(RootConfig::default().with_max_render_cycles(5));
    let err = root.render(settle(1_000), container).unwrap_err();

    assert_eq!(err, RenderError::UpdateDepthExceeded { limit: 5 });
    assert_eq!(root.stats().commits, 5);
    assert!(!root.has_pending_work());
}

// =============================================================================
// Failures
// =============================================================================

fn flaky(props: &Props) -> Rendered {
    if props.bool("fail").unwrap_or_default() {
        return Err(RenderError::msg("boom"));
    }
    Ok(h("p", Attributes::new(), props.str("label").unwrap_or_default()).into())
}

#[test]
fn test_render_error_leaves_output_untouched() {
    let (mut root, container) = mount(RootConfig::default());
    let view = |label: &str, fail: bool| {
        h(
            "div",
            Attributes::new(),
            build(Kind::component(flaky), Attributes::new().with("label", label).with("fail", fail), ()),
        )
    };
    root.render(view("ok", false), container).unwrap();
    let stats = root.host().stats();

    let err = root.render(view("changed", true), container).unwrap_err();

    assert_eq!(err, RenderError::component("flaky", "boom"));
    assert_eq!(html(&root, container), "<div><p>ok</p></div>");
    assert_eq!(root.host().stats().appends, stats.appends);
    assert_eq!(root.host().stats().removals, stats.removals);
    assert_eq!(root.stats().commits, 1);

    root.render(view("again", false), container).unwrap();
    assert_eq!(html(&root, container), "<div><p>again</p></div>");
}

#[test]
fn test_state_of_aborted_pass_is_kept() {
    let (mut root, container) = mount(RootConfig::default());
    let setter: Captured<SetState<i32>> = Captured::default();
    let slot = setter.clone();
    let failures = Counter::default();
    root.render(
        build(
            Kind::component(move |_| {
                let (value, set_value) = use_state(|| 0)?;
                slot.store(set_value);
                if value == 1 && failures.get() == 0 {
                    failures.hit();
                    return Err(RenderError::msg("boom"));
                }
                Ok(h("b", Attributes::new(), value).into())
            }),
            Attributes::new(),
            (),
        ),
        container,
    )
    .unwrap();

    setter.get().set(1);
    assert!(root.flush().is_err());
    assert_eq!(html(&root, container), "<b>0</b>");

    // The output still shows 0, so this is not a same-value update
    setter.get().set(1);
    assert!(root.has_pending_work());
    root.flush().unwrap();
    assert_eq!(html(&root, container), "<b>1</b>");
}

#[test]
fn test_failing_effect_does_not_stop_others() {
    let (mut root, container) = mount(RootConfig::default());
    let journal = Journal::default();
    let log = journal.clone();
    root.render(
        build(
            Kind::component(move |_| {
                use_effect(|| Err(EffectError::new("first failed")), None)?;
                let log = log.clone();
                use_effect(
                    move || {
                        log.push("second ran");
                        Ok(Some(Cleanup::fallible(|| Err(EffectError::from("cleanup failed")))))
                    },
                    Some(spark_fiber::deps![]),
                )?;
                Ok(h("b", Attributes::new(), "done").into())
            }),
            Attributes::new(),
            (),
        ),
        container,
    )
    .unwrap();

    assert_eq!(html(&root, container), "<b>done</b>");
    assert_eq!(journal.take(), vec!["second ran"]);
    let errors = root.take_effect_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message(), "first failed");

    root.render((), container).unwrap();
    let errors = root.take_effect_errors();
    assert_eq!(errors.iter().map(EffectError::message).collect::<Vec<_>>(), vec!["cleanup failed"]);
    assert!(root.take_effect_errors().is_empty());
}

// =============================================================================
// Events
// =============================================================================

#[test]
fn test_click_updates_after_flush() {
    let (mut root, container) = mount(RootConfig::default());
    root.render(
        build(
            Kind::component(|_| {
                let (count, set_count) = use_state(|| 0)?;
                Ok(h(
                    "button",
                    Attributes::new().on("click", move |_| set_count.update(|n| n + 1)),
                    format!("clicked {count}"),
                )
                .into())
            }),
            Attributes::new(),
            (),
        ),
        container,
    )
    .unwrap();
    let button = root.host().child_nodes(container)[0];

    root.host().dispatch_event(button, &Event::new("click"));
    root.host().dispatch_event(button, &Event::new("click"));
    assert_eq!(html(&root, container), "<button>clicked 0</button>");

    root.flush().unwrap();
    assert_eq!(html(&root, container), "<button>clicked 2</button>");
    assert_eq!(root.host().child_nodes(container), &[button]);
}

// =============================================================================
// Class components
// =============================================================================

struct Ticker {
    label: String,
    ticks: u32,
    updater: Updater,
    journal: Journal,
}

impl ClassComponent for Ticker {
    fn create(props: &Props, updater: Updater) -> Self {
        let journal = props.value::<Journal>("journal").map(|j| (*j).clone()).unwrap_or_default();
        journal.push("create");
        Self {
            label: String::new(),
            ticks: 0,
            updater,
            journal,
        }
    }

    fn set_props(&mut self, props: &Props) {
        self.label = props.str("label").unwrap_or_default().to_string();
    }

    fn render(&mut self) -> Rendered {
        Ok(h("span", Attributes::new(), format!("{} {}", self.label, self.ticks)).into())
    }

    fn did_mount(&mut self) -> Result<(), EffectError> {
        self.journal.push("did_mount");
        Ok(())
    }

    fn did_update(&mut self) -> Result<(), EffectError> {
        self.journal.push("did_update");
        if self.ticks < 1 {
            self.ticks += 1;
            self.updater.schedule_render();
        }
        Ok(())
    }

    fn will_unmount(&mut self) -> Result<(), EffectError> {
        self.journal.push("will_unmount");
        Ok(())
    }
}

#[test]
fn test_class_component_lifecycle() {
    let (mut root, container) = mount(RootConfig::default());
    let journal = Journal::default();
    let ticker = |label: &str| {
        build(
            Kind::class::<Ticker>(),
            Attributes::new()
                .with("label", label)
                .with("journal", spark_fiber::AttrValue::any(journal.clone())),
            (),
        )
    };

    root.render(ticker("a"), container).unwrap();
    assert_eq!(html(&root, container), "<span>a 0</span>");
    assert_eq!(journal.take(), vec!["create", "did_mount"]);

    root.render(ticker("b"), container).unwrap();
    assert_eq!(html(&root, container), "<span>b 1</span>");
    assert_eq!(journal.take(), vec!["did_update", "did_update"]);

    root.render((), container).unwrap();
    assert_eq!(journal.take(), vec!["will_unmount"]);
}

#[test]
fn test_independent_roots_do_not_share_state() {
    let (mut first, first_container) = mount(RootConfig::default());
    let (mut second, second_container) = mount(RootConfig::default());

    first.render(settle(2), first_container).unwrap();
    second.render(settle(5), second_container).unwrap();

    assert_eq!(html(&first, first_container), "2");
    assert_eq!(html(&second, second_container), "5");
}
