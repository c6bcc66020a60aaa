use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type Hook = Rc<dyn Fn()>;

/// Lifecycle hooks of one component instance.
///
/// Mount and unmount hooks run on every (re)attachment of a kept-alive
/// instance; destroy hooks run once.
#[derive(Default)]
pub struct Lifecycle {
    mounted: RefCell<Vec<Hook>>,
    will_unmount: RefCell<Vec<Hook>>,
    destroyed: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl Lifecycle {
    /// Register a hook to run when the component's host node is attached
    pub fn on_mounted(&self, f: impl Fn() + 'static) {
        self.mounted.borrow_mut().push(Rc::new(f));
    }

    /// Register a hook to run before the host node is detached or destroyed
    pub fn on_will_unmount(&self, f: impl Fn() + 'static) {
        self.will_unmount.borrow_mut().push(Rc::new(f));
    }

    /// Register a hook to run when the component is destroyed
    pub fn on_destroyed(&self, f: impl FnOnce() + 'static) {
        self.destroyed.borrow_mut().push(Box::new(f));
    }

    pub(crate) fn run_mounted(&self) {
        run_all(&self.mounted);
    }

    pub(crate) fn run_will_unmount(&self) {
        run_all(&self.will_unmount);
    }

    pub(crate) fn run_destroyed(&self) {
        // Hooks may register further hooks; those are dropped.
        let hooks = std::mem::take(&mut *self.destroyed.borrow_mut());
        for hook in hooks {
            hook();
        }
    }
}

fn run_all(hooks: &RefCell<Vec<Hook>>) {
    // Snapshot so a hook can register more hooks without a double borrow.
    let hooks = hooks.borrow().clone();
    for hook in hooks {
        hook();
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("mounted", &self.mounted.borrow().len())
            .field("will_unmount", &self.will_unmount.borrow().len())
            .field("destroyed", &self.destroyed.borrow().len())
            .finish()
    }
}
