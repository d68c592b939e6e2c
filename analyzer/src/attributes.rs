//! Instruction attribute classification
//!
//! Every distinct instruction form is classified once, the first time the instrumentation sees
//! it, into an immutable [`InstAttributes`] record. The record carries everything the FLOP
//! calculator needs later: whether the form is floating point, its FMA weight, its lane count and
//! whether its lanes are predicated by a mask register.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use clap::ValueEnum;
use flopcount_core::{IForm, InstAttribute, InstCategory, InstDescriptor, OperandInfo};
use serde::Serialize;

use crate::InstCounters;

/// Criterion used to decide whether an instruction form is a floating-point operation
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FpCriterion {
    /// Category must be a floating-point capable one and operand 0 must hold floating-point
    /// elements
    #[default]
    Strict,
    /// Category alone decides.  Integer SIMD forms of the vector categories count as FLOPs.
    #[value(name = "category")]
    CategoryOnly,
}

impl fmt::Display for FpCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FpCriterion::Strict => write!(f, "strict"),
            FpCriterion::CategoryOnly => write!(f, "category"),
        }
    }
}

pub fn is_flop(inst: &impl InstDescriptor, criterion: FpCriterion) -> bool {
    if !inst.category().is_flop() {
        return false;
    }
    match criterion {
        FpCriterion::CategoryOnly => true,
        FpCriterion::Strict => {
            inst.noperands() > 0 && inst.operand_element_type(0).is_floating_point()
        }
    }
}

pub fn is_fma(inst: &impl InstDescriptor) -> bool {
    inst.category().is_fma()
}

pub fn is_scalar_simd(inst: &impl InstDescriptor) -> bool {
    inst.attribute(InstAttribute::SimdScalar)
}

pub fn is_mask_op(inst: &impl InstDescriptor) -> bool {
    inst.attribute(InstAttribute::MaskOp)
}

/// Number of lanes addressed by operand 0, or 0 for forms without operands
pub fn element_count(inst: &impl InstDescriptor) -> u32 {
    if inst.noperands() == 0 {
        0
    } else {
        inst.operand_elements(0)
    }
}

/// Static attributes of one instruction form
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InstAttributes {
    pub iform: IForm,
    pub iform_name: String,
    pub iclass: String,
    pub category: InstCategory,
    pub extension: String,
    /// Shape of every decoded operand, in decoder order
    pub operands: Vec<OperandInfo>,
    pub is_flop: bool,
    pub is_fma: bool,
    pub is_scalar_simd: bool,
    pub is_mask_op: bool,
    /// Lane multiplier of unmasked executions
    pub element_count: u32,
}

impl InstAttributes {
    pub fn classify(inst: &impl InstDescriptor, criterion: FpCriterion) -> Self {
        Self {
            iform: inst.iform(),
            iform_name: inst.iform_name().to_string(),
            iclass: inst.iclass().to_string(),
            category: inst.category(),
            extension: inst.extension().to_string(),
            operands: (0..inst.noperands()).map(|i| inst.operand(i)).collect(),
            is_flop: is_flop(inst, criterion),
            is_fma: is_fma(inst),
            is_scalar_simd: is_scalar_simd(inst),
            is_mask_op: is_mask_op(inst),
            element_count: element_count(inst),
        }
    }

    /// Operations per element: 2 for fused multiply-add families, 1 otherwise
    pub fn fma_weight(&self) -> u64 {
        if self.is_fma {
            2
        } else {
            1
        }
    }

    /// FLOPs performed by the executions accumulated in `counters`.
    ///
    /// Masked forms use the sampled active-lane total, since disabled lanes do no work; unmasked
    /// forms always work on their full static lane width.
    pub fn flops(&self, counters: &InstCounters) -> u64 {
        if !self.is_flop {
            return 0;
        }
        if self.is_mask_op {
            counters.mask_popcount * self.fma_weight()
        } else {
            counters.count * self.fma_weight() * self.element_count as u64
        }
    }
}

/// Process-wide memo of [`InstAttributes`], one entry per instruction form.
///
/// Entries are written at most once, under the write lock, and never change afterwards.
#[derive(Debug, Default)]
pub struct AttributeTable {
    criterion: FpCriterion,
    forms: RwLock<HashMap<IForm, Arc<InstAttributes>>>,
}

impl AttributeTable {
    pub fn new(criterion: FpCriterion) -> Self {
        Self { criterion, forms: RwLock::new(HashMap::new()) }
    }

    pub fn criterion(&self) -> FpCriterion {
        self.criterion
    }

    /// Returns the attributes of the form of `inst`, classifying it on first sight
    pub fn get_or_classify(&self, inst: &impl InstDescriptor) -> Arc<InstAttributes> {
        let iform = inst.iform();
        if let Some(attributes) = self.get(iform) {
            return attributes;
        }
        let mut forms = self.forms.write().unwrap_or_else(PoisonError::into_inner);
        forms
            .entry(iform)
            .or_insert_with(|| Arc::new(InstAttributes::classify(inst, self.criterion)))
            .clone()
    }

    pub fn get(&self, iform: IForm) -> Option<Arc<InstAttributes>> {
        self.forms.read().unwrap_or_else(PoisonError::into_inner).get(&iform).cloned()
    }

    pub fn len(&self) -> usize {
        self.forms.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flopcount_core::{DecodedInst, ElementType};

    fn vfmadd_ps_ymm() -> DecodedInst {
        DecodedInst::new(
            IForm(5221),
            "VFMADD231PS_YMMqq_YMMqq_YMMqq",
            "VFMADD231PS",
            InstCategory::Vfma,
            "FMA",
        )
        .with_operand(OperandInfo::new(32, ElementType::Single, 8))
        .with_operand(OperandInfo::new(32, ElementType::Single, 8))
        .with_operand(OperandInfo::new(32, ElementType::Single, 8))
    }

    fn paddd_xmm() -> DecodedInst {
        DecodedInst::new(IForm(3012), "PADDD_XMMdq_XMMdq", "PADDD", InstCategory::Sse, "SSE2")
            .with_operand(OperandInfo::new(32, ElementType::Int, 4))
            .with_operand(OperandInfo::new(32, ElementType::Int, 4))
    }

    #[test]
    fn test_classify_fma() {
        let attributes = InstAttributes::classify(&vfmadd_ps_ymm(), FpCriterion::Strict);
        assert!(attributes.is_flop);
        assert!(attributes.is_fma);
        assert!(!attributes.is_mask_op);
        assert!(!attributes.is_scalar_simd);
        assert_eq!(attributes.element_count, 8);
        assert_eq!(attributes.fma_weight(), 2);
        assert_eq!(attributes.operands.len(), 3);
    }

    #[test]
    fn test_strict_criterion_rejects_integer_simd() {
        assert!(!is_flop(&paddd_xmm(), FpCriterion::Strict));
        assert!(is_flop(&paddd_xmm(), FpCriterion::CategoryOnly));
    }

    #[test]
    fn test_non_flop_category() {
        let mov = DecodedInst::new(IForm(1), "MOV_GPRv_GPRv_89", "MOV", InstCategory::DataXfer, "BASE")
            .with_operand(OperandInfo::new(64, ElementType::Int, 1));
        assert!(!is_flop(&mov, FpCriterion::Strict));
        assert!(!is_flop(&mov, FpCriterion::CategoryOnly));
    }

    #[test]
    fn test_no_operands() {
        let fninit =
            DecodedInst::new(IForm(77), "FNINIT", "FNINIT", InstCategory::X87Alu, "X87");
        assert_eq!(element_count(&fninit), 0);
        assert!(!is_flop(&fninit, FpCriterion::Strict));
        assert!(is_flop(&fninit, FpCriterion::CategoryOnly));
    }

    #[test]
    fn test_classification_is_idempotent() {
        let first = InstAttributes::classify(&vfmadd_ps_ymm(), FpCriterion::Strict);
        let second = InstAttributes::classify(&vfmadd_ps_ymm(), FpCriterion::Strict);
        assert_eq!(first, second);
    }

    #[test]
    fn test_table_memoizes_first_sighting() {
        let table = AttributeTable::new(FpCriterion::Strict);
        let first = table.get_or_classify(&vfmadd_ps_ymm());

        // Same form id, different descriptor: the cached record wins
        let mut impostor = paddd_xmm();
        impostor.iform = IForm(5221);
        let second = table.get_or_classify(&impostor);

        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.is_fma);
        assert_eq!(table.len(), 1);
        assert!(table.get(IForm(3012)).is_none());
    }

    #[test]
    fn test_flops_formulas() {
        let unmasked = InstAttributes::classify(&vfmadd_ps_ymm(), FpCriterion::Strict);
        let counters = InstCounters { count: 10, mask_popcount: 0, flops: 0 };
        assert_eq!(unmasked.flops(&counters), 10 * 2 * 8);

        let masked = InstAttributes::classify(
            &DecodedInst::new(
                IForm(2301),
                "VADDPD_ZMMf64_MASKmskw_ZMMf64_ZMMf64_AVX512",
                "VADDPD",
                InstCategory::Avx512,
                "AVX512EVEX",
            )
            .with_operand(OperandInfo::new(64, ElementType::Double, 8))
            .with_attribute(InstAttribute::MaskOp),
            FpCriterion::Strict,
        );
        let counters = InstCounters { count: 3, mask_popcount: 9, flops: 0 };
        assert_eq!(masked.flops(&counters), 9);

        let integer = InstAttributes::classify(&paddd_xmm(), FpCriterion::Strict);
        let counters = InstCounters { count: 100, mask_popcount: 0, flops: 0 };
        assert_eq!(integer.flops(&counters), 0);
    }
}
