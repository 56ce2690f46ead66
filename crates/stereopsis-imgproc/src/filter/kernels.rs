/// Create the integer 3-tap sobel kernels.
///
/// # Returns
///
/// The derivative kernel `[-1, 0, 1]` and the smoothing kernel `[1, 2, 1]`. Their outer
/// product is the 3x3 horizontal sobel operator.
pub fn sobel_kernel_1d() -> ([i32; 3], [i32; 3]) {
    ([-1, 0, 1], [1, 2, 1])
}
