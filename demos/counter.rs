//! Counter and keyed list driven through the sliced scheduler.
//!
//! Run with: cargo run --example counter

use std::cell::Cell;
use std::rc::Rc;

use spark_fiber::{
    build, deps, h, use_effect, use_state, Attributes, Child, Cleanup, Event, Kind, MemoryDom, NodeId, Props,
    RenderError, Rendered, Root, RootConfig, WorkStatus,
};

fn app(_: &Props) -> Rendered {
    let (count, set_count) = use_state(|| 0)?;
    let (items, set_items) = use_state(|| vec!["milk".to_string(), "eggs".to_string()])?;

    use_effect(
        move || {
            tracing::info!(count, "count committed");
            Ok(Some(Cleanup::new(move || tracing::info!(count, "count superseded"))))
        },
        Some(deps![count]),
    )?;

    let increment = set_count.clone();
    let add = set_items.clone();
    let rows: Vec<_> = items
        .iter()
        .map(|item| h("li", Attributes::new().with("key", item.as_str()), item.as_str()))
        .collect();

    Ok(spark_fiber::children![
        h(
            "button",
            Attributes::new()
                .with("id", "increment")
                .on("click", move |_| increment.update(|n| n + 1)),
            format!("clicked {count} times"),
        ),
        h(
            "button",
            Attributes::new().with("id", "add").on("click", move |event: &Event| {
                let item = event.value.clone().unwrap_or_else(|| "bread".into());
                add.update(move |items| {
                    let mut items = items.clone();
                    items.push(item);
                    items
                });
            }),
            "add",
        ),
        h("ul", Attributes::new().with("class", "shopping"), rows),
    ])
}

/// Drive the root the way a host event loop would: one slice per wake-up.
fn drain(root: &mut Root<MemoryDom>, woken: &Cell<bool>) -> Result<(), RenderError> {
    while woken.replace(false) || root.has_pending_work() {
        let mut slices = 1;
        while root.work_slice()? == WorkStatus::Yielded {
            slices += 1;
        }
        tracing::debug!(slices, "work drained");
    }
    Ok(())
}

fn click(root: &Root<MemoryDom>, container: NodeId, id: &str, event: Event) {
    if let Some(button) = root.host().find_by_attribute(container, "id", id) {
        root.host().dispatch_event(button, &event);
    }
}

fn main() -> Result<(), RenderError> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let mut root = Root::new(MemoryDom::new(), RootConfig::sliced());
    let container = root.host_mut().create_container();
    let woken = Rc::new(Cell::new(false));
    let flag = woken.clone();
    root.set_waker(move || flag.set(true));

    root.render(build(Kind::component(app), Attributes::new(), Child::Empty), container)?;
    drain(&mut root, &woken)?;
    println!("{}", root.host().inner_html(container));

    click(&root, container, "increment", Event::new("click"));
    click(&root, container, "increment", Event::new("click"));
    click(&root, container, "add", Event::with_value("click", "butter"));
    drain(&mut root, &woken)?;
    println!("{}", root.host().inner_html(container));

    if let Some(log) = root.last_commit() {
        print!("{log}");
    }
    println!("{:?}", root.stats());

    root.unmount();
    Ok(())
}
