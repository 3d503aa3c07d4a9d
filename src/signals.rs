/// Sources that can hold the shared IRQ line low
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IrqSource {
    FrameCounter = 0b0000_0001,
    Dmc = 0b0000_0010,
    Mapper = 0b0000_0100,
}

/// The two machine-wide interrupt lines.
///
/// NMI is edge-triggered: the CPU latches a rising edge when it samples the line.
/// IRQ is level-triggered: the line is asserted while any source holds it.
/// Both are written by PPU/APU/mapper and sampled once per CPU cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct BusLines {
    nmi: bool,
    nmi_cancel: bool,
    irq: u8,
}

impl BusLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive the NMI line
    pub fn set_nmi(&mut self, asserted: bool) {
        self.nmi = asserted;
    }

    pub fn nmi(&self) -> bool {
        self.nmi
    }

    /// Withdraw an NMI edge the CPU may already have latched.
    /// Raised by a $2002 read racing the start of VBlank.
    pub fn cancel_nmi(&mut self) {
        self.nmi_cancel = true;
    }

    /// Consume the cancel strobe
    pub fn take_nmi_cancel(&mut self) -> bool {
        std::mem::take(&mut self.nmi_cancel)
    }

    /// Assert or release the IRQ line on behalf of one source
    pub fn set_irq(&mut self, source: IrqSource, asserted: bool) {
        if asserted {
            self.irq |= source as u8;
        } else {
            self.irq &= !(source as u8);
        }
    }

    /// True while any source holds the IRQ line
    pub fn irq(&self) -> bool {
        self.irq != 0
    }

    pub fn irq_from(&self, source: IrqSource) -> bool {
        self.irq & source as u8 != 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irq_is_level_of_all_sources() {
        let mut lines = BusLines::new();
        assert!(!lines.irq());

        lines.set_irq(IrqSource::Dmc, true);
        lines.set_irq(IrqSource::Mapper, true);
        assert!(lines.irq());

        lines.set_irq(IrqSource::Dmc, false);
        assert!(lines.irq());
        assert!(lines.irq_from(IrqSource::Mapper));
        assert!(!lines.irq_from(IrqSource::Dmc));

        lines.set_irq(IrqSource::Mapper, false);
        assert!(!lines.irq());
    }

    #[test]
    fn test_nmi_cancel_is_one_shot() {
        let mut lines = BusLines::new();
        lines.cancel_nmi();
        assert!(lines.take_nmi_cancel());
        assert!(!lines.take_nmi_cancel());
    }
}
