//! Enumerate-then-fetch driver queries
//!
//! Vulkan list queries are called twice: once with a null pointer to learn the
//! count, once with a buffer of that size. The list can grow between the two
//! calls, in which case the driver returns `VK_INCOMPLETE` and the pair is
//! repeated.

use ash::vk;

/// Run a two-call Vulkan list query into an owned `Vec`.
///
/// `call` receives the count slot and either a null pointer (count query) or a
/// buffer with room for exactly `*count` elements (fill query).
pub fn query_list<T, F>(mut call: F) -> Result<Vec<T>, vk::Result>
where
    T: Default + Clone,
    F: FnMut(&mut u32, *mut T) -> vk::Result,
{
    loop {
        let mut count = 0u32;
        call(&mut count, std::ptr::null_mut()).result()?;

        let mut data = vec![T::default(); count as usize];
        let result = call(&mut count, data.as_mut_ptr());
        if result == vk::Result::INCOMPLETE {
            continue;
        }
        result.result()?;

        data.truncate(count as usize);
        return Ok(data);
    }
}

/// Run a list query whose driver entry point cannot fail
pub fn query_list_infallible<T, F>(mut call: F) -> Vec<T>
where
    T: Default + Clone,
    F: FnMut(&mut u32, *mut T),
{
    let mut count = 0u32;
    call(&mut count, std::ptr::null_mut());

    let mut data = vec![T::default(); count as usize];
    call(&mut count, data.as_mut_ptr());
    data.truncate(count as usize);
    data
}
