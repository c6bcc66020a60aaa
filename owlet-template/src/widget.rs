//! Embedded components: what a template needs from the widgets it splices in.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use owlet_dom::{Event, HostNode, Key};

use crate::error::RenderResult;
use crate::value::Value;

/// A widget's render, resolved once its host node is up to date.
pub type WidgetFuture = Pin<Box<dyn Future<Output = RenderResult<()>>>>;

/// Receives `t-on-*` events bound in a template.
pub trait EventOwner {
    fn handle_event(&self, method: &str, args: &[Value], event: &Event);
}

/// A live component instance embedded with `t-widget`.
///
/// `start` and `update_props` render the widget into its own host node; the
/// embedding template adopts that node once the returned future resolves.
pub trait Widget {
    fn start(self: Rc<Self>) -> WidgetFuture;
    fn update_props(self: Rc<Self>, props: Value) -> WidgetFuture;

    /// Tears the instance down for good.
    fn destroy(&self);
    /// Takes the host node out of the tree but keeps the instance alive for reuse.
    fn detach(&self);
    /// Called once the adopted host node is attached.
    fn mounted(&self);

    fn is_started(&self) -> bool;
    fn is_destroyed(&self) -> bool;
    fn is_mounted(&self) -> bool;

    /// Props of a first render that has not completed yet.
    fn in_flight_props(&self) -> Option<Value>;
    fn host_node(&self) -> Option<HostNode>;
    fn owner(&self) -> Option<Rc<dyn EventOwner>>;
}

/// Builds widgets by the name given to `t-widget`.
pub trait WidgetFactory {
    /// `None` when no widget is known under `name`.
    fn create(&self, name: &str, props: Value) -> Option<Rc<dyn Widget>>;
}

/// Live widget instances of one owner, by widget key.
#[derive(Clone, Default)]
pub struct WidgetCache {
    live: Rc<RefCell<HashMap<Key, Rc<dyn Widget>>>>,
}

impl WidgetCache {
    pub fn get(&self, key: &Key) -> Option<Rc<dyn Widget>> {
        self.live.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: Key, widget: Rc<dyn Widget>) {
        self.live.borrow_mut().insert(key, widget);
    }

    /// Drops `key` only if it still maps to `widget`.
    pub fn remove_if_same(&self, key: &Key, widget: &Rc<dyn Widget>) -> bool {
        let mut live = self.live.borrow_mut();
        match live.get(key) {
            Some(current) if Rc::ptr_eq(current, widget) => {
                live.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.live.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.borrow().is_empty()
    }

    /// Destroys every live instance.
    pub fn clear(&self) {
        let drained: Vec<_> = self.live.borrow_mut().drain().map(|(_, w)| w).collect();
        for widget in drained {
            if !widget.is_destroyed() {
                widget.destroy();
            }
        }
    }
}

impl fmt::Debug for WidgetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let live = self.live.borrow();
        f.debug_struct("WidgetCache").field("keys", &live.keys().collect::<Vec<_>>()).finish()
    }
}
