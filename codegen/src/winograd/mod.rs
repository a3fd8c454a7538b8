//! Winograd minimal-filtering convolution strategies.
//!
//! A strategy is fully determined by its lane ISA, the kernel size `K` and the
//! output block `M`; the input block `α = M + K - 1` is always derived. Each of
//! the four stages is a pure function from caller-chosen variable names to a C
//! snippet that the composing kernel splices into its loops:
//!
//! | stage | runs | layout in → out |
//! |-------|------|-----------------|
//! | [`weight_trans`](WinogradStrategy::weight_trans) | once per model load | `[OCB][ICB][K][K][4ic][4oc]` → `[α²][OCB][ICB][4ic][4oc]` |
//! | [`input_feature_trans`](WinogradStrategy::input_feature_trans) | per input tile | `[ICB][IH][IW][4]` → `[α²][ICB][tiles][4]` |
//! | [`batched_matmul`](WinogradStrategy::batched_matmul) | per tile batch | calls the MK4 micro-kernel `α²` times |
//! | [`output_feature_trans`](WinogradStrategy::output_feature_trans) | per output tile | `[α²][OCB][tiles][4]` → `[OCB][OH][OW][4]` |

pub mod cook_toom;
pub mod rational;

use enumset::EnumSet;
use snafu::ensure;

use crate::c::{CodeBuffer, LaneIsa};
use crate::context::Activation;
use crate::error::{InvalidWinogradSnafu, Result};
use crate::kernels::mk4_matmul;
use crate::InstructionSet;

use self::cook_toom::{MAX_INPUT_BLOCK, WinogradMatrices};
use self::rational::Rational;

/// Upper bound on `α` accepted for code generation.
pub const MAX_TILE: u32 = 8;

/// Epilogue information the output transform needs besides variable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageContext {
    pub activation: Activation,
    pub has_bias: bool,
}

/// One concrete Winograd variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WinogradStrategy {
    isa: LaneIsa,
    kernel_size: u32,
    output_block: u32,
}

impl WinogradStrategy {
    pub const F23_NEON: Self = Self::new_unchecked(LaneIsa::Neon, 3, 2);
    pub const F43_NEON: Self = Self::new_unchecked(LaneIsa::Neon, 3, 4);
    pub const F63_NEON: Self = Self::new_unchecked(LaneIsa::Neon, 3, 6);
    pub const F23_PORTABLE: Self = Self::new_unchecked(LaneIsa::Portable, 3, 2);

    /// Validated constructor. Only `K >= 2`, `M >= 1` and `α <= 8` are realisable.
    pub fn new(isa: LaneIsa, kernel_size: u32, output_block: u32) -> Result<Self> {
        ensure!(
            kernel_size >= 2
                && output_block >= 1
                && kernel_size <= MAX_TILE
                && output_block <= MAX_TILE
                && output_block + kernel_size - 1 <= MAX_TILE
                && (output_block + kernel_size - 1) as usize <= MAX_INPUT_BLOCK,
            InvalidWinogradSnafu { kernel_size, output_block }
        );
        Ok(Self::new_unchecked(isa, kernel_size, output_block))
    }

    const fn new_unchecked(isa: LaneIsa, kernel_size: u32, output_block: u32) -> Self {
        Self { isa, kernel_size, output_block }
    }

    pub const fn isa(&self) -> LaneIsa {
        self.isa
    }

    pub const fn kernel_size(&self) -> u32 {
        self.kernel_size
    }

    pub const fn output_block(&self) -> u32 {
        self.output_block
    }

    /// `α = M + K - 1`.
    pub const fn input_block(&self) -> u32 {
        self.output_block + self.kernel_size - 1
    }

    /// Algorithm tag, e.g. `winograd_f23_mk4`.
    pub fn name(&self) -> String {
        format!("winograd_f{}{}_mk4", self.output_block, self.kernel_size)
    }

    pub fn instructions(&self) -> EnumSet<InstructionSet> {
        self.isa.instructions()
    }

    pub fn matrices(&self) -> WinogradMatrices {
        WinogradMatrices::new(self.output_block as usize, self.kernel_size as usize)
    }

    /// Symbol of the MK4 micro-kernel the batched matmul stage calls.
    pub fn depend_matmul_symbol(&self) -> String {
        mk4_matmul::symbol(self.isa)
    }

    fn banner(&self, stage: &str) -> String {
        let (m, k, a) = (self.output_block, self.kernel_size, self.input_block());
        format!("// F({m}x{m}, {k}x{k}) {stage}, tile {a}x{a}")
    }

    /// Filter transform `U = G g Gᵀ`.
    ///
    /// Names: `[src, dst, oc_blocks, ic_blocks]`.
    pub fn weight_trans(&self, names: &[&str; 4]) -> String {
        let [src, dst, oc_blocks, ic_blocks] = *names;
        let (k, alpha) = (self.kernel_size as usize, self.input_block() as usize);
        let m = self.matrices();
        let vt = self.isa.value_type();

        let mut code = CodeBuffer::new();
        code.line(self.banner("weight transform"));
        code.open(format!("for (int ocb = 0; ocb < {oc_blocks}; ++ocb) {{"));
        code.open(format!("for (int icb = 0; icb < {ic_blocks}; ++icb) {{"));
        code.line(format!("const float* filter = {src} + (ocb * {ic_blocks} + icb) * {};", k * k * 16));
        code.line(format!("float* trans = {dst} + (ocb * {ic_blocks} + icb) * 16;"));
        code.open("for (int ic = 0; ic < 4; ++ic) {");
        self.isa.open_lanes(&mut code);
        for h in 0..k {
            for w in 0..k {
                let load = self.isa.load(&format!("filter + ({} + ic) * 4", (h * k + w) * 4));
                code.line(format!("const {vt} g{h}{w} = {load};"));
            }
        }
        // tmp = G g, alpha x K
        for i in 0..alpha {
            for w in 0..k {
                let names: Vec<String> = (0..k).map(|h| format!("g{h}{w}")).collect();
                let expr = self.isa.linear_combination(&terms(&m.g[i], &names));
                code.line(format!("const {vt} wt{i}{w} = {expr};"));
            }
        }
        // U = tmp Gᵀ, alpha x alpha
        for i in 0..alpha {
            for j in 0..alpha {
                let names: Vec<String> = (0..k).map(|w| format!("wt{i}{w}")).collect();
                let expr = self.isa.linear_combination(&terms(&m.g[j], &names));
                let ptr = format!("trans + {} * {oc_blocks} * {ic_blocks} * 16 + ic * 4", i * alpha + j);
                code.line(self.isa.store(&ptr, &expr));
            }
        }
        self.isa.close_lanes(&mut code);
        code.close("}");
        code.close("}");
        code.close("}");
        code.finish()
    }

    /// Input tile transform `V = Bᵀ d B`, zero-padding out-of-range pixels.
    ///
    /// Names: `[src, dst, ic_block, ic_blocks, ih, iw, ih_start, iw_start, tile, nr_tiles]`.
    pub fn input_feature_trans(&self, names: &[&str; 10]) -> String {
        let [src, dst, ic_block, ic_blocks, ih, iw, ih_start, iw_start, tile, nr_tiles] = *names;
        let alpha = self.input_block() as usize;
        let m = self.matrices();
        let vt = self.isa.value_type();

        let mut code = CodeBuffer::new();
        code.line(self.banner("input transform"));
        code.open("{");
        code.line(format!("float patch[{}];", alpha * alpha * 4));
        code.line("memset(patch, 0, sizeof(patch));");
        code.open(format!("for (int py = 0; py < {alpha}; ++py) {{"));
        code.line(format!("const int in_h = {ih_start} + py;"));
        code.line(format!("if (in_h < 0 || in_h >= {ih}) continue;"));
        code.open(format!("for (int px = 0; px < {alpha}; ++px) {{"));
        code.line(format!("const int in_w = {iw_start} + px;"));
        code.line(format!("if (in_w < 0 || in_w >= {iw}) continue;"));
        code.line(format!(
            "memcpy(patch + (py * {alpha} + px) * 4, {src} + (({ic_block} * {ih} + in_h) * {iw} + in_w) * 4, \
             4 * sizeof(float));"
        ));
        code.close("}");
        code.close("}");
        self.isa.open_lanes(&mut code);
        for i in 0..alpha {
            for j in 0..alpha {
                let load = self.isa.load(&format!("patch + {}", (i * alpha + j) * 4));
                code.line(format!("const {vt} d{i}{j} = {load};"));
            }
        }
        // tmp = Bᵀ d
        for i in 0..alpha {
            for j in 0..alpha {
                let names: Vec<String> = (0..alpha).map(|k| format!("d{k}{j}")).collect();
                let expr = self.isa.linear_combination(&terms(&m.bt[i], &names));
                code.line(format!("const {vt} t{i}{j} = {expr};"));
            }
        }
        // V = tmp B
        for i in 0..alpha {
            for j in 0..alpha {
                let names: Vec<String> = (0..alpha).map(|k| format!("t{i}{k}")).collect();
                let expr = self.isa.linear_combination(&terms(&m.bt[j], &names));
                let ptr = format!("{dst} + (({} * {ic_blocks} + {ic_block}) * {nr_tiles} + {tile}) * 4", i * alpha + j);
                code.line(self.isa.store(&ptr, &expr));
            }
        }
        self.isa.close_lanes(&mut code);
        code.close("}");
        code.finish()
    }

    /// One MK4 matmul per transformed position.
    ///
    /// Names: `[weight, trans_input, trans_output, oc_blocks, ic_blocks, nr_tiles]`.
    pub fn batched_matmul(&self, names: &[&str; 6]) -> String {
        let [weight, trans_input, trans_output, oc_blocks, ic_blocks, nr_tiles] = *names;
        let alpha = self.input_block() as usize;
        let symbol = self.depend_matmul_symbol();

        let mut code = CodeBuffer::new();
        code.line(self.banner("batched matmul"));
        code.open(format!("for (int pos = 0; pos < {}; ++pos) {{", alpha * alpha));
        code.line(format!(
            "{symbol}({weight} + pos * {oc_blocks} * {ic_blocks} * 16, {trans_input} + pos * {ic_blocks} * {nr_tiles} * 4, \
             {trans_output} + pos * {oc_blocks} * {nr_tiles} * 4, {oc_blocks}, {nr_tiles}, {ic_blocks});"
        ));
        code.close("}");
        code.finish()
    }

    /// Output tile transform `Y = Aᵀ m A`, then bias, activation and a
    /// bounds-checked store.
    ///
    /// Names: `[src, dst, bias, oc_block, oc_blocks, oh, ow, oh_start, ow_start, tile, nr_tiles]`.
    pub fn output_feature_trans(&self, names: &[&str; 11], ctx: &StageContext) -> String {
        let [src, dst, bias, oc_block, oc_blocks, oh, ow, oh_start, ow_start, tile, nr_tiles] = *names;
        let (out, alpha) = (self.output_block as usize, self.input_block() as usize);
        let m = self.matrices();
        let vt = self.isa.value_type();

        let mut code = CodeBuffer::new();
        code.line(self.banner("output transform"));
        code.open("{");
        self.isa.open_lanes(&mut code);
        for i in 0..alpha {
            for j in 0..alpha {
                let ptr = format!("{src} + (({} * {oc_blocks} + {oc_block}) * {nr_tiles} + {tile}) * 4", i * alpha + j);
                code.line(format!("const {vt} m{i}{j} = {};", self.isa.load(&ptr)));
            }
        }
        // tmp = Aᵀ m, M x alpha
        for r in 0..out {
            for j in 0..alpha {
                let names: Vec<String> = (0..alpha).map(|k| format!("m{k}{j}")).collect();
                let expr = self.isa.linear_combination(&terms(&m.at[r], &names));
                code.line(format!("const {vt} ot{r}{j} = {expr};"));
            }
        }
        // Y = tmp A, M x M
        for r in 0..out {
            for c in 0..out {
                let names: Vec<String> = (0..alpha).map(|k| format!("ot{r}{k}")).collect();
                let expr = self.isa.linear_combination(&terms(&m.at[c], &names));
                code.line(format!("{vt} y{r}{c} = {expr};"));
            }
        }
        if ctx.has_bias {
            code.line(format!("const {vt} bias_v = {};", self.isa.load(&format!("{bias} + {oc_block} * 4"))));
        }
        for r in 0..out {
            for c in 0..out {
                let var = format!("y{r}{c}");
                if ctx.has_bias {
                    code.line(format!("{var} = {};", self.isa.add(&var, "bias_v")));
                }
                if let Some(stmt) = self.isa.activation(&var, ctx.activation) {
                    code.line(stmt);
                }
            }
        }
        for r in 0..out {
            for c in 0..out {
                code.open(format!("if ({oh_start} + {r} < {oh} && {ow_start} + {c} < {ow}) {{"));
                let ptr = format!("{dst} + (({oc_block} * {oh} + {oh_start} + {r}) * {ow} + {ow_start} + {c}) * 4");
                code.line(self.isa.store(&ptr, &format!("y{r}{c}")));
                code.close("}");
            }
        }
        self.isa.close_lanes(&mut code);
        code.close("}");
        code.finish()
    }
}

/// Pair one matrix row with the variable names it weights.
fn terms<'a>(row: &[Rational], names: &'a [String]) -> Vec<(Rational, &'a str)> {
    row.iter().copied().zip(names.iter().map(String::as_str)).collect()
}
