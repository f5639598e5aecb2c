//! Iterator adapters.

/// Iterator returned by [`IteratorExt::take_while_aggregate`].
#[derive(Debug, Clone)]
pub struct TakeWhileAggregate<I, A, F, P> {
    iter: I,
    aggregate: A,
    aggregator: F,
    predicate: P,
    done: bool,
}

impl<I, A, F, P> Iterator for TakeWhileAggregate<I, A, F, P>
where
    I: Iterator,
    A: Clone,
    F: FnMut(A, &I::Item) -> A,
    P: FnMut(&A) -> bool,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.iter.next()?;
        self.aggregate = (self.aggregator)(self.aggregate.clone(), &item);
        if (self.predicate)(&self.aggregate) {
            Some(item)
        } else {
            self.done = true;
            None
        }
    }
}

pub trait IteratorExt: Iterator + Sized {
    /// Yield items while a running aggregate satisfies `predicate`.
    ///
    /// The aggregate is folded *including* the current item before the
    /// predicate is checked; the first failing item ends the iteration and is
    /// not yielded.
    fn take_while_aggregate<A, F, P>(
        self,
        seed: A,
        aggregator: F,
        predicate: P,
    ) -> TakeWhileAggregate<Self, A, F, P>
    where
        A: Clone,
        F: FnMut(A, &Self::Item) -> A,
        P: FnMut(&A) -> bool,
    {
        TakeWhileAggregate {
            iter: self,
            aggregate: seed,
            aggregator,
            predicate,
            done: false,
        }
    }
}

impl<I: Iterator> IteratorExt for I {}
