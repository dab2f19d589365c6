use std::{
    cell::RefCell,
    hash::Hash,
    rc::{Rc, Weak},
};

use crate::{
    list::{ListNode, ListOutput},
    ActiveList, ActiveValue, ListChange, Subscription, Watched,
};


/// Operators whose selectors also read an [`ActiveValue`] parameter.
///
/// A change of the parameter rebuilds the operator with the new value and emits a single
/// `Reset`. Changes of the sources between parameter changes are incremental as usual.
impl<T: Clone + 'static> ActiveList<T> {
    pub fn filter_with_param<P: Clone + 'static>(
        &self,
        param: &ActiveValue<P>,
        predicate: impl Fn(&T, &P) -> bool + 'static,
    ) -> ActiveList<T> {
        self.filter_with_param_watched(param, predicate, Watched::none())
    }
    pub fn filter_with_param_watched<P: Clone + 'static>(
        &self,
        param: &ActiveValue<P>,
        predicate: impl Fn(&T, &P) -> bool + 'static,
        watched: Watched<T>,
    ) -> ActiveList<T> {
        let source = self.clone();
        let predicate = Rc::new(predicate);
        with_param("filter_with_param", param, move |p| {
            let predicate = predicate.clone();
            let p = p.clone();
            source.filter_watched(move |x| predicate(x, &p), watched.clone())
        })
    }

    pub fn map_with_param<P, U>(
        &self,
        param: &ActiveValue<P>,
        f: impl Fn(&T, &P) -> U + 'static,
    ) -> ActiveList<U>
    where
        P: Clone + 'static,
        U: Clone + 'static,
    {
        self.map_with_param_watched(param, f, Watched::none())
    }
    pub fn map_with_param_watched<P, U>(
        &self,
        param: &ActiveValue<P>,
        f: impl Fn(&T, &P) -> U + 'static,
        watched: Watched<T>,
    ) -> ActiveList<U>
    where
        P: Clone + 'static,
        U: Clone + 'static,
    {
        let source = self.clone();
        let f = Rc::new(f);
        with_param("map_with_param", param, move |p| {
            let f = f.clone();
            let p = p.clone();
            source.map_watched(move |x| f(x, &p), watched.clone())
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn join_with_param<R, P, K, U>(
        &self,
        right: &ActiveList<R>,
        param: &ActiveValue<P>,
        left_key: impl Fn(&T, &P) -> K + 'static,
        right_key: impl Fn(&R, &P) -> K + 'static,
        result: impl Fn(&T, &R, &P) -> U + 'static,
    ) -> ActiveList<U>
    where
        R: Clone + 'static,
        P: Clone + 'static,
        K: Eq + Hash + Clone + 'static,
        U: Clone + 'static,
    {
        self.join_with_param_watched(
            right,
            param,
            left_key,
            right_key,
            result,
            Watched::none(),
            Watched::none(),
        )
    }
    #[allow(clippy::too_many_arguments)]
    pub fn join_with_param_watched<R, P, K, U>(
        &self,
        right: &ActiveList<R>,
        param: &ActiveValue<P>,
        left_key: impl Fn(&T, &P) -> K + 'static,
        right_key: impl Fn(&R, &P) -> K + 'static,
        result: impl Fn(&T, &R, &P) -> U + 'static,
        watched_left: Watched<T>,
        watched_right: Watched<R>,
    ) -> ActiveList<U>
    where
        R: Clone + 'static,
        P: Clone + 'static,
        K: Eq + Hash + Clone + 'static,
        U: Clone + 'static,
    {
        let (left, right) = (self.clone(), right.clone());
        let (left_key, right_key, result) = (Rc::new(left_key), Rc::new(right_key), Rc::new(result));
        with_param("join_with_param", param, move |p| {
            let (lk, rk, res) = (left_key.clone(), right_key.clone(), result.clone());
            let (p0, p1, p2) = (p.clone(), p.clone(), p.clone());
            left.join_watched(
                &right,
                move |l| lk(l, &p0),
                move |r| rk(r, &p1),
                move |l, r| res(l, r, &p2),
                watched_left.clone(),
                watched_right.clone(),
            )
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn outer_join_with_param<R, P, K, U>(
        &self,
        right: &ActiveList<R>,
        param: &ActiveValue<P>,
        left_key: impl Fn(&T, &P) -> K + 'static,
        right_key: impl Fn(&R, &P) -> K + 'static,
        result: impl Fn(Option<&T>, Option<&R>, &P) -> U + 'static,
    ) -> ActiveList<U>
    where
        R: Clone + 'static,
        P: Clone + 'static,
        K: Eq + Hash + Clone + 'static,
        U: Clone + 'static,
    {
        self.outer_join_with_param_watched(
            right,
            param,
            left_key,
            right_key,
            result,
            Watched::none(),
            Watched::none(),
        )
    }
    #[allow(clippy::too_many_arguments)]
    pub fn outer_join_with_param_watched<R, P, K, U>(
        &self,
        right: &ActiveList<R>,
        param: &ActiveValue<P>,
        left_key: impl Fn(&T, &P) -> K + 'static,
        right_key: impl Fn(&R, &P) -> K + 'static,
        result: impl Fn(Option<&T>, Option<&R>, &P) -> U + 'static,
        watched_left: Watched<T>,
        watched_right: Watched<R>,
    ) -> ActiveList<U>
    where
        R: Clone + 'static,
        P: Clone + 'static,
        K: Eq + Hash + Clone + 'static,
        U: Clone + 'static,
    {
        let (left, right) = (self.clone(), right.clone());
        let (left_key, right_key, result) = (Rc::new(left_key), Rc::new(right_key), Rc::new(result));
        with_param("outer_join_with_param", param, move |p| {
            let (lk, rk, res) = (left_key.clone(), right_key.clone(), result.clone());
            let (p0, p1, p2) = (p.clone(), p.clone(), p.clone());
            left.outer_join_watched(
                &right,
                move |l| lk(l, &p0),
                move |r| rk(r, &p1),
                move |l, r| res(l, r, &p2),
                watched_left.clone(),
                watched_right.clone(),
            )
        })
    }
}

fn with_param<P, U>(
    name: &'static str,
    param: &ActiveValue<P>,
    build: impl Fn(&P) -> ActiveList<U> + 'static,
) -> ActiveList<U>
where
    P: 'static,
    U: Clone + 'static,
{
    ActiveList::from_node(WithParam::new(name, param, build))
}

/// Relays the changes of a list built from the parameter, rebuilding it whenever the
/// parameter changes.
struct WithParam<P: 'static, U: 'static, B> {
    out: ListOutput<U>,
    build: B,
    this: Weak<Self>,
    inner: RefCell<(ActiveList<U>, Subscription)>,
    param: ActiveValue<P>,
    _subscription: Subscription,
}

impl<P, U, B> WithParam<P, U, B>
where
    P: 'static,
    U: Clone + 'static,
    B: Fn(&P) -> ActiveList<U> + 'static,
{
    fn new(name: &'static str, param: &ActiveValue<P>, build: B) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let inner = build(&param.borrow());
            let subscription = inner.bind(this, Self::on_inner_change);
            Self {
                out: ListOutput::new(name, inner.to_vec()),
                build,
                this: this.clone(),
                inner: RefCell::new((inner, subscription)),
                param: param.clone(),
                _subscription: param.bind(this, |this: &Self, _| this.rebuild()),
            }
        })
    }

    fn on_inner_change(&self, change: &ListChange<U>) {
        self.out.replay(change);
    }

    fn rebuild(&self) {
        let inner = (self.build)(&self.param.borrow());
        let subscription = inner.bind(&self.this, Self::on_inner_change);
        let items = inner.to_vec();
        tracing::trace!(len = items.len(), "parameter changed");
        // the previous list and its item subscriptions are released here
        *self.inner.borrow_mut() = (inner, subscription);
        self.out.reset(items);
    }
}
impl<P: 'static, U: 'static, B: 'static> ListNode<U> for WithParam<P, U, B> {
    fn output(&self) -> &ListOutput<U> {
        &self.out
    }
}
